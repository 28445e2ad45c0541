//! Provenance markers shown to privileged viewers next to resolved values.

use std::fmt;

/// Which marker applies to a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginMarker {
    FromCache,
    NotFromCache,
    /// The value was fetched live but the API client dependency could not be
    /// located, so the authenticated path was unavailable.
    CheckConfig,
}

impl OriginMarker {
    pub fn text(self) -> &'static str {
        match self {
            Self::FromCache => "[from cache]",
            Self::NotFromCache => "[NOT from cache]",
            Self::CheckConfig => "[check config: dependency path not found]",
        }
    }

    /// Markup used when the marker is embedded in a rendered page.
    pub fn to_html(self) -> String {
        format!("<span class=\"small\"><em><b>{}</b></em></span>", self.text())
    }
}

impl fmt::Display for OriginMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Picks the marker, or `None` when the viewer must not see one.
pub fn marker(
    from_cache: bool,
    is_admin: bool,
    display_origin: bool,
    autoload_resolvable: bool,
) -> Option<OriginMarker> {
    if !(is_admin && display_origin) {
        return None;
    }
    Some(if from_cache {
        OriginMarker::FromCache
    } else if !autoload_resolvable {
        OriginMarker::CheckConfig
    } else {
        OriginMarker::NotFromCache
    })
}

/// Plain-text annotation; empty when no marker applies.
pub fn annotate(
    from_cache: bool,
    is_admin: bool,
    display_origin: bool,
    autoload_resolvable: bool,
) -> String {
    marker(from_cache, is_admin, display_origin, autoload_resolvable)
        .map(|m| m.text().to_string())
        .unwrap_or_default()
}
