//! Fetches single fields of Vimeo videos and albums.
//!
//! Videos are first looked up on the unauthenticated `api/v2` endpoint, which
//! is cheap and not rate limited. When that endpoint does not answer with a
//! 200 (private videos, or the direct lookup is switched off) the resolver
//! falls back to the authenticated REST API. Albums only exist on the REST
//! API.
//!
//! Internally every step returns `Result<_, ResolveError>`. The public
//! `fetch_*` methods log the error and hand back an empty string instead, so
//! callers always get a value to render.

use std::{fmt, str::FromStr, time::Duration};

use anyhow::bail;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    config::Settings,
    legacy::{self, LegacyError},
};

const API_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";
const PICTURE_SIZES_FIELD: &str = "pictures.sizes";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("media id is empty")]
    EmptyId,
    #[error("media id {0:?} contains characters that cannot appear in a request path")]
    InvalidId(String),
    #[error("API client dependency path not found")]
    DependencyPathNotFound,
    #[error("no Vimeo credentials configured")]
    MissingCredentials,
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("could not decode legacy response: {0}")]
    Legacy(#[from] LegacyError),
    #[error("could not decode API response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field {0:?} missing from response")]
    MissingField(String),
}

/// Which kind of remote object an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Album,
}

impl MediaKind {
    fn collection(self) -> &'static str {
        match self {
            MediaKind::Video => "videos",
            MediaKind::Album => "albums",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbSize {
    Small,
    Medium,
    #[default]
    Large,
}

impl ThumbSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ThumbSize::Small => "small",
            ThumbSize::Medium => "medium",
            ThumbSize::Large => "large",
        }
    }

    fn legacy_field(self) -> String {
        format!("thumbnail_{}", self.as_str())
    }

    /// Index into the API's size list used by the historical mapping. The
    /// third entry is never picked.
    fn legacy_index(self) -> usize {
        match self {
            ThumbSize::Small => 0,
            ThumbSize::Medium => 1,
            ThumbSize::Large => 3,
        }
    }
}

impl FromStr for ThumbSize {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim() {
            "small" => Ok(ThumbSize::Small),
            "medium" => Ok(ThumbSize::Medium),
            "large" => Ok(ThumbSize::Large),
            other => bail!("unknown thumbnail size {other:?} (expected small, medium or large)"),
        }
    }
}

impl fmt::Display for ThumbSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendition from `pictures.sizes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PictureSize {
    pub width: u32,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Minimal blocking GET used by the resolver. Non-2xx statuses are returned
/// as responses, not errors; only failures to get any answer are errors.
pub trait Transport {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse, ResolveError>;
}

/// [`Transport`] backed by a `ureq` agent with a bounded timeout.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("vimeoapi-tools/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.http_timeout())
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse, ResolveError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        let transport_err = |message: String| ResolveError::Transport {
            url: url.to_string(),
            message,
        };
        match request.call() {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .map_err(|err| transport_err(err.to_string()))?;
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Status(status, response)) => Ok(HttpResponse {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(err)) => Err(transport_err(err.to_string())),
        }
    }
}

/// Direct-then-authenticated field lookup over a [`Transport`].
#[derive(Debug)]
pub struct RemoteResolver<T> {
    transport: T,
}

impl<T: Transport> RemoteResolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Value of `field` for the given object, or an empty string when it
    /// cannot be resolved for any reason.
    pub fn fetch_field(
        &self,
        settings: &Settings,
        kind: MediaKind,
        id: &str,
        field: &str,
    ) -> String {
        self.try_field(settings, kind, id, field)
            .unwrap_or_else(|err| swallow(&err, id, field))
    }

    /// Thumbnail link of a video in the requested size, or an empty string.
    pub fn fetch_thumbnail(&self, settings: &Settings, id: &str, size: ThumbSize) -> String {
        self.try_thumbnail(settings, id, size)
            .unwrap_or_else(|err| swallow(&err, id, &size.legacy_field()))
    }

    pub fn try_field(
        &self,
        settings: &Settings,
        kind: MediaKind,
        id: &str,
        field: &str,
    ) -> Result<String, ResolveError> {
        let id = normalize_id(id)?;

        if kind == MediaKind::Video
            && let Some(record) = self.direct_record(settings, id)?
        {
            return record
                .get(field)
                .map(field_text)
                .ok_or_else(|| ResolveError::MissingField(field.to_string()));
        }

        let body = self.api_get(settings, kind, id, field)?;
        body.get(field)
            .map(field_text)
            .ok_or_else(|| ResolveError::MissingField(field.to_string()))
    }

    pub fn try_thumbnail(
        &self,
        settings: &Settings,
        id: &str,
        size: ThumbSize,
    ) -> Result<String, ResolveError> {
        let id = normalize_id(id)?;

        if let Some(record) = self.direct_record(settings, id)? {
            let field = size.legacy_field();
            return record
                .get(&field)
                .map(field_text)
                .ok_or(ResolveError::MissingField(field));
        }

        let body = self.api_get(settings, MediaKind::Video, id, PICTURE_SIZES_FIELD)?;
        let sizes = body
            .get("pictures")
            .and_then(|pictures| pictures.get("sizes"))
            .cloned()
            .ok_or_else(|| ResolveError::MissingField(PICTURE_SIZES_FIELD.to_string()))?;
        let sizes: Vec<PictureSize> = serde_json::from_value(sizes)?;

        pick_thumbnail(&sizes, size, settings.legacy_quirks)
            .map(|picture| picture.link.clone())
            .ok_or_else(|| ResolveError::MissingField(format!("pictures.sizes ({size})")))
    }

    /// First record from the unauthenticated endpoint, or `None` when the
    /// endpoint is disabled or did not answer 200 and the API should be used.
    fn direct_record(
        &self,
        settings: &Settings,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, ResolveError> {
        if !settings.direct_lookup {
            return Ok(None);
        }
        let url = format!("{}/video/{id}.php", settings.direct_base);
        let response = match self.transport.get(&url, &[]) {
            Ok(response) => response,
            Err(err) => {
                log::debug!("direct lookup unavailable, using API: {err}");
                return Ok(None);
            }
        };
        if response.status != 200 {
            log::debug!("direct lookup for {id} answered {}, using API", response.status);
            return Ok(None);
        }

        let decoded = legacy::parse(&response.body)?;
        Ok(Some(legacy::first_record(&decoded).cloned().unwrap_or_default()))
    }

    /// Authenticated GET of `/me/{videos|albums}/{id}?fields=...`.
    fn api_get(
        &self,
        settings: &Settings,
        kind: MediaKind,
        id: &str,
        fields: &str,
    ) -> Result<Value, ResolveError> {
        if settings.resolve_autoload_path().is_none() {
            return Err(ResolveError::DependencyPathNotFound);
        }
        let authorization =
            authorization_header(settings).ok_or(ResolveError::MissingCredentials)?;

        let url = format!(
            "{}/me/{}/{id}?fields={fields}",
            settings.api_base,
            kind.collection()
        );
        let headers = [
            ("Authorization", authorization),
            ("Accept", API_ACCEPT.to_string()),
        ];
        let response = self.transport.get(&url, &headers)?;
        if response.status != 200 {
            return Err(ResolveError::Status {
                url,
                status: response.status,
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}

/// Chooses the rendition for `size`.
///
/// The historical mapping is positional: small, medium and large are the
/// entries at indices 0, 1 and 3, matched by width, so a list shorter than
/// four entries has no large thumbnail. The default mapping uses the narrowest
/// and widest entries for small and large and the middle one for medium.
pub fn pick_thumbnail(
    sizes: &[PictureSize],
    size: ThumbSize,
    legacy_quirks: bool,
) -> Option<&PictureSize> {
    if legacy_quirks {
        let width = sizes.get(size.legacy_index())?.width;
        return sizes.iter().find(|picture| picture.width == width);
    }

    let mut ordered: Vec<&PictureSize> = sizes.iter().collect();
    ordered.sort_by_key(|picture| picture.width);
    match size {
        ThumbSize::Small => ordered.first().copied(),
        ThumbSize::Medium => ordered.get(ordered.len().saturating_sub(1) / 2).copied(),
        ThumbSize::Large => ordered.last().copied(),
    }
}

fn authorization_header(settings: &Settings) -> Option<String> {
    if !settings.has_credentials() {
        return None;
    }
    if !settings.access_token.is_empty() {
        return Some(format!("bearer {}", settings.access_token));
    }
    let pair = format!("{}:{}", settings.client_id, settings.client_secret);
    Some(format!("basic {}", STANDARD.encode(pair)))
}

fn normalize_id(id: &str) -> Result<&str, ResolveError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ResolveError::EmptyId);
    }
    if id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&' | '%'))
    {
        return Err(ResolveError::InvalidId(id.to_string()));
    }
    Ok(id)
}

/// Text form of a decoded field. Numbers keep their decimal rendering;
/// null and `false` read as empty.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn swallow(err: &ResolveError, id: &str, field: &str) -> String {
    match err {
        ResolveError::EmptyId | ResolveError::MissingField(_) => {
            log::debug!("no {field} for {id:?}: {err}");
        }
        _ => log::warn!("resolving {field} for {id:?} failed: {err}"),
    }
    String::new()
}
