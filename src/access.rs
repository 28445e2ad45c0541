#![forbid(unsafe_code)]

//! Privilege checks that gate diagnostic output and cache overrides.

/// Query parameter that asks for the cache to be bypassed and rewritten.
pub const UPDATE_CACHE_PARAM: &str = "vimeoapi_updatecache";

/// The caller on whose behalf values are resolved. Only site admins may see
/// provenance markers or force a cache refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewer {
    pub is_admin: bool,
    pub update_cache: bool,
}

impl Viewer {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn admin() -> Self {
        Self {
            is_admin: true,
            update_cache: false,
        }
    }

    /// Builds a viewer from the request's privilege and raw query string.
    pub fn from_request(is_admin: bool, query: &str) -> Self {
        Self {
            is_admin,
            update_cache: query_has_param(query, UPDATE_CACHE_PARAM),
        }
    }

    /// True only for admins who asked for a refresh; everyone else gets the
    /// normal cache policy.
    pub fn force_cache_update(&self) -> bool {
        self.is_admin && self.update_cache
    }
}

fn query_has_param(query: &str, name: &str) -> bool {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split('=').next())
        .any(|key| key == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_with_param_forces_update() {
        let viewer = Viewer::from_request(true, "?id=3&vimeoapi_updatecache");
        assert!(viewer.force_cache_update());
        let viewer = Viewer::from_request(true, "vimeoapi_updatecache=1");
        assert!(viewer.force_cache_update());
    }

    #[test]
    fn guest_param_is_ignored() {
        let viewer = Viewer::from_request(false, "vimeoapi_updatecache=1");
        assert!(viewer.update_cache);
        assert!(!viewer.force_cache_update());
    }

    #[test]
    fn similar_names_do_not_match() {
        let viewer = Viewer::from_request(true, "vimeoapi_cacheupdate=1&x=vimeoapi_updatecache");
        assert!(!viewer.force_cache_update());
        assert!(!Viewer::admin().force_cache_update());
    }
}
