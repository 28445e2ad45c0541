#![forbid(unsafe_code)]

//! Public entry point for the vimeoapi crate.
//!
//! The crate resolves video and album metadata (durations, thumbnail links)
//! from Vimeo, keeps the answers in a namespaced cache and renders a small
//! marker telling privileged viewers whether a value was served from cache.

pub mod access;
pub mod config;
pub mod format;
pub mod gateway;
pub mod legacy;
pub mod origin;
pub mod remote;
pub mod store;

pub use access::Viewer;
pub use config::Settings;
pub use format::{DurationFormat, format_duration};
pub use gateway::{Gateway, Resolution};
pub use remote::{MediaKind, RemoteResolver, ThumbSize};
pub use store::{CacheStore, MemoryStore, Namespace, SqliteStore};
