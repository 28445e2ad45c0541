//! Get-or-populate wrapper around the remote resolver.
//!
//! Every public call follows the same policy: a blank id short-circuits, a
//! stored non-blank value is served unless caching is off or the viewer forced
//! a refresh, and anything else goes to Vimeo and is written back, empty
//! results included. Concurrent misses may both fetch and both write; the last
//! write wins.

use crate::{
    access::Viewer,
    config::Settings,
    format::{DurationFormat, format_duration},
    origin,
    remote::{MediaKind, RemoteResolver, ThumbSize, Transport, UreqTransport},
    store::{CacheStore, Namespace},
};

const DURATION_FIELD: &str = "duration";

/// A resolved value and whether it came from the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub value: String,
    pub from_cache: bool,
}

/// What to ask the resolver for on a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRequest<'a> {
    Field(MediaKind, &'a str),
    Thumbnail(ThumbSize),
}

/// Empty strings and `"0"` count as "nothing stored", so a zero-second
/// duration is never served from cache.
pub fn is_blank(value: &str) -> bool {
    value.is_empty() || value == "0"
}

#[derive(Debug)]
pub struct Gateway<S, T = UreqTransport> {
    settings: Settings,
    store: S,
    resolver: RemoteResolver<T>,
}

impl<S: CacheStore> Gateway<S, UreqTransport> {
    /// Gateway talking to Vimeo over HTTP with the configured timeout.
    pub fn connect(settings: Settings, store: S) -> Self {
        let transport = UreqTransport::from_settings(&settings);
        Self::new(settings, store, transport)
    }
}

impl<S: CacheStore, T: Transport> Gateway<S, T> {
    pub fn new(settings: Settings, store: S, transport: T) -> Self {
        Self {
            settings,
            store,
            resolver: RemoteResolver::new(transport),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolver(&self) -> &RemoteResolver<T> {
        &self.resolver
    }

    /// Serves `request` for `id` from `namespace`, fetching and storing it on
    /// a miss.
    pub fn resolve(
        &self,
        id: &str,
        request: FieldRequest<'_>,
        namespace: Namespace,
        force_refresh: bool,
    ) -> Resolution {
        let id = id.trim();
        if id.is_empty() {
            return Resolution::default();
        }

        if self.settings.caching && !force_refresh {
            match self.store.get(namespace, id) {
                Ok(Some(value)) if !is_blank(&value) => {
                    log::debug!("cache hit {namespace}/{id}");
                    return Resolution {
                        value,
                        from_cache: true,
                    };
                }
                Ok(_) => {}
                Err(err) => log::warn!("cache read {namespace}/{id} failed: {err:#}"),
            }
        }

        log::debug!("cache miss {namespace}/{id} (forced: {force_refresh})");
        let value = match request {
            FieldRequest::Field(kind, field) => {
                self.resolver.fetch_field(&self.settings, kind, id, field)
            }
            FieldRequest::Thumbnail(size) => {
                self.resolver.fetch_thumbnail(&self.settings, id, size)
            }
        };

        if let Err(err) = self.store.set(namespace, id, &value) {
            log::warn!("cache write {namespace}/{id} failed: {err:#}");
        }

        Resolution {
            value,
            from_cache: false,
        }
    }

    /// Formatted album duration followed by the provenance marker.
    pub fn album_duration(
        &self,
        album_id: &str,
        format: DurationFormat,
        viewer: &Viewer,
    ) -> String {
        self.duration(MediaKind::Album, Namespace::AlbumDurations, album_id, format, viewer)
    }

    /// Formatted video duration followed by the provenance marker.
    pub fn video_duration(
        &self,
        video_id: &str,
        format: DurationFormat,
        viewer: &Viewer,
    ) -> String {
        self.duration(MediaKind::Video, Namespace::VideoDurations, video_id, format, viewer)
    }

    /// Thumbnail link of a video, optionally followed by the provenance
    /// marker.
    ///
    /// Thumbnails are cached per video, not per size: whichever size was
    /// resolved first is served for every size until the entry is refreshed.
    pub fn video_thumb(
        &self,
        video_id: &str,
        size: ThumbSize,
        display_origin: bool,
        viewer: &Viewer,
    ) -> String {
        if video_id.trim().is_empty() {
            return String::new();
        }
        let resolution = self.resolve(
            video_id,
            FieldRequest::Thumbnail(size),
            Namespace::VideoThumbs,
            viewer.force_cache_update(),
        );
        if display_origin {
            format!("{} {}", resolution.value, self.annotate(resolution.from_cache, viewer))
        } else {
            resolution.value
        }
    }

    /// Marker for `viewer`; empty unless they are an admin and origin
    /// display is switched on. Rendered as HTML when `html_markers` is set.
    pub fn annotate(&self, from_cache: bool, viewer: &Viewer) -> String {
        let visible = viewer.is_admin && self.settings.display_origin;
        let marker = origin::marker(
            from_cache,
            viewer.is_admin,
            self.settings.display_origin,
            !visible || self.settings.autoload_resolvable(),
        );
        match marker {
            Some(m) if self.settings.html_markers => m.to_html(),
            Some(m) => m.text().to_string(),
            None => String::new(),
        }
    }

    /// Drops every cached value.
    pub fn purge(&self) -> anyhow::Result<()> {
        self.store.purge()
    }

    fn duration(
        &self,
        kind: MediaKind,
        namespace: Namespace,
        id: &str,
        format: DurationFormat,
        viewer: &Viewer,
    ) -> String {
        if id.trim().is_empty() {
            return String::new();
        }
        let resolution = self.resolve(
            id,
            FieldRequest::Field(kind, DURATION_FIELD),
            namespace,
            viewer.force_cache_update(),
        );
        let formatted = format_duration(&resolution.value, format, self.settings.legacy_quirks);
        format!("{formatted} {}", self.annotate(resolution.from_cache, viewer))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{remote::testing::ScriptedTransport, store::MemoryStore};

    const DIRECT_42: &str = "https://vimeo.com/api/v2/video/42.php";
    const DIRECT_BODY: &str = concat!(
        r#"a:1:{i:0;a:2:{s:8:"duration";i:3725;"#,
        r#"s:15:"thumbnail_small";s:11:"https://s/1";}}"#
    );
    const ALBUM_9: &str = "https://api.vimeo.com/me/albums/9?fields=duration";

    fn settings() -> (TempDir, Settings) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("autoload.php"), "").unwrap();
        let settings = Settings {
            autoload_path: dir.path().display().to_string(),
            access_token: "tok".to_string(),
            display_origin: true,
            ..Settings::default()
        };
        (dir, settings)
    }

    fn gateway(
        settings: Settings,
        transport: ScriptedTransport,
    ) -> Gateway<MemoryStore, ScriptedTransport> {
        Gateway::new(settings, MemoryStore::new(), transport)
    }

    fn duration_request() -> FieldRequest<'static> {
        FieldRequest::Field(MediaKind::Video, DURATION_FIELD)
    }

    #[test]
    fn cached_value_served_without_remote_calls() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new());
        gw.store().set(Namespace::VideoDurations, "42", "62").unwrap();

        let resolution = gw.resolve("42", duration_request(), Namespace::VideoDurations, false);
        assert_eq!(
            resolution,
            Resolution {
                value: "62".to_string(),
                from_cache: true
            }
        );
        assert_eq!(gw.resolver().transport().call_count(), 0);
    }

    #[test]
    fn blank_id_touches_nothing() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new());
        assert_eq!(
            gw.resolve("  ", duration_request(), Namespace::VideoDurations, true),
            Resolution::default()
        );
        assert_eq!(gw.video_duration("", DurationFormat::Hms, &Viewer::admin()), "");
        assert_eq!(gw.video_thumb("", ThumbSize::Large, true, &Viewer::admin()), "");
        for namespace in Namespace::ALL {
            assert_eq!(gw.store().get(namespace, "").unwrap(), None);
        }
        assert_eq!(gw.resolver().transport().call_count(), 0);
    }

    #[test]
    fn miss_fetches_and_stores() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new().respond(DIRECT_42, 200, DIRECT_BODY));

        let first = gw.resolve(" 42", duration_request(), Namespace::VideoDurations, false);
        assert_eq!(first.value, "3725");
        assert!(!first.from_cache);
        assert_eq!(
            gw.store().get(Namespace::VideoDurations, "42").unwrap().as_deref(),
            Some("3725")
        );

        let second = gw.resolve("42", duration_request(), Namespace::VideoDurations, false);
        assert!(second.from_cache);
        assert_eq!(gw.resolver().transport().call_count(), 1);
    }

    #[test]
    fn forced_refresh_bypasses_and_overwrites() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new().respond(DIRECT_42, 200, DIRECT_BODY));
        gw.store().set(Namespace::VideoDurations, "42", "stale").unwrap();

        for expected_calls in 1..=2 {
            let resolution = gw.resolve("42", duration_request(), Namespace::VideoDurations, true);
            assert_eq!(resolution.value, "3725");
            assert!(!resolution.from_cache);
            assert_eq!(gw.resolver().transport().call_count(), expected_calls);
            assert_eq!(
                gw.store().get(Namespace::VideoDurations, "42").unwrap().as_deref(),
                Some("3725")
            );
        }
    }

    #[test]
    fn disabled_caching_always_fetches_but_still_writes() {
        let (_dir, mut settings) = settings();
        settings.caching = false;
        let gw = gateway(settings, ScriptedTransport::new().respond(DIRECT_42, 200, DIRECT_BODY));
        gw.store().set(Namespace::VideoDurations, "42", "62").unwrap();

        let resolution = gw.resolve("42", duration_request(), Namespace::VideoDurations, false);
        assert_eq!(resolution.value, "3725");
        assert!(!resolution.from_cache);
        assert_eq!(
            gw.store().get(Namespace::VideoDurations, "42").unwrap().as_deref(),
            Some("3725")
        );
    }

    #[test]
    fn negative_results_are_written_but_never_hit() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new());

        for expected_calls in [2, 4] {
            let resolution = gw.resolve("42", duration_request(), Namespace::VideoDurations, false);
            assert_eq!(resolution, Resolution::default());
            // direct lookup plus API attempt per miss
            assert_eq!(gw.resolver().transport().call_count(), expected_calls);
        }
        assert_eq!(
            gw.store().get(Namespace::VideoDurations, "42").unwrap().as_deref(),
            Some("")
        );
    }

    #[test]
    fn zero_duration_counts_as_missing() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new());
        gw.store().set(Namespace::VideoDurations, "42", "0").unwrap();
        let resolution = gw.resolve("42", duration_request(), Namespace::VideoDurations, false);
        assert!(!resolution.from_cache);
        assert!(is_blank("0"));
        assert!(!is_blank("00"));
    }

    #[test]
    fn video_duration_formats_and_annotates() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new().respond(DIRECT_42, 200, DIRECT_BODY));
        let admin = Viewer::admin();

        assert_eq!(
            gw.video_duration("42", DurationFormat::Colon, &admin),
            "01:02:05 [NOT from cache]"
        );
        assert_eq!(
            gw.video_duration("42", DurationFormat::Hms, &admin),
            "1 hour 2 mins 5 secs [from cache]"
        );
        assert_eq!(
            gw.video_duration("42", DurationFormat::Colon, &Viewer::guest()),
            "01:02:05 "
        );
    }

    #[test]
    fn html_markers_wrap_annotation() {
        let (_dir, mut settings) = settings();
        settings.html_markers = true;
        let gw = gateway(settings, ScriptedTransport::new().respond(DIRECT_42, 200, DIRECT_BODY));

        assert_eq!(
            gw.video_duration("42", DurationFormat::Colon, &Viewer::admin()),
            "01:02:05 <span class=\"small\"><em><b>[NOT from cache]</b></em></span>"
        );
        assert_eq!(
            gw.annotate(true, &Viewer::admin()),
            "<span class=\"small\"><em><b>[from cache]</b></em></span>"
        );
        assert_eq!(gw.annotate(true, &Viewer::guest()), "");
    }

    #[test]
    fn guest_refresh_request_is_ignored() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new().respond(DIRECT_42, 200, DIRECT_BODY));
        gw.store().set(Namespace::VideoDurations, "42", "65").unwrap();

        let guest = Viewer::from_request(false, "vimeoapi_updatecache");
        assert_eq!(gw.video_duration("42", DurationFormat::Colon, &guest), "01:05 ");
        assert_eq!(gw.resolver().transport().call_count(), 0);

        let admin = Viewer::from_request(true, "vimeoapi_updatecache");
        assert_eq!(
            gw.video_duration("42", DurationFormat::Colon, &admin),
            "01:02:05 [NOT from cache]"
        );
    }

    #[test]
    fn album_duration_uses_album_namespace() {
        let (_dir, settings) = settings();
        let transport = ScriptedTransport::new().respond(ALBUM_9, 200, r#"{"duration":65}"#);
        let gw = gateway(settings, transport);
        assert_eq!(
            gw.album_duration("9", DurationFormat::Seconds, &Viewer::guest()),
            " 65 secs "
        );
        assert_eq!(
            gw.store().get(Namespace::AlbumDurations, "9").unwrap().as_deref(),
            Some("65")
        );
        assert_eq!(gw.store().get(Namespace::VideoDurations, "9").unwrap(), None);
    }

    #[test]
    fn unresolvable_dependency_path_is_flagged() {
        let (_dir, mut settings) = settings();
        settings.autoload_path = "/nonexistent/vendor".to_string();
        let transport = ScriptedTransport::new().respond(ALBUM_9, 200, r#"{"duration":65}"#);
        let gw = gateway(settings, transport);
        assert_eq!(
            gw.album_duration("9", DurationFormat::Colon, &Viewer::admin()),
            " [check config: dependency path not found]"
        );
    }

    #[test]
    fn thumbnail_cached_per_video() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new().respond(DIRECT_42, 200, DIRECT_BODY));
        let admin = Viewer::admin();

        assert_eq!(
            gw.video_thumb("42", ThumbSize::Small, true, &admin),
            "https://s/1 [NOT from cache]"
        );
        assert_eq!(gw.video_thumb("42", ThumbSize::Large, false, &admin), "https://s/1");
        assert_eq!(gw.resolver().transport().call_count(), 1);
    }

    #[test]
    fn purge_clears_store() {
        let (_dir, settings) = settings();
        let gw = gateway(settings, ScriptedTransport::new());
        gw.store().set(Namespace::VideoThumbs, "1", "x").unwrap();
        gw.purge().unwrap();
        assert_eq!(gw.store().get(Namespace::VideoThumbs, "1").unwrap(), None);
    }
}
