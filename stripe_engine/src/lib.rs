//! Client-side data and rendering engine for historical daily capacity-factor
//! "stripe" visualisations.
//!
//! This crate owns everything between a remote time-series API and the
//! screen: a rate-limited, retrying, circuit-breaking request queue; a
//! year-keyed LRU cache of serialised annual payloads; a tile renderer that
//! turns a year's payload into a pixel buffer per facility; and a navigation
//! animator that turns pointer/wheel/keyboard input into a single absolute
//! day offset. See [`engine::Engine`] for the public facade.

pub mod colormap;
pub mod config;
pub mod datekit;
pub mod engine;
pub mod error;
pub mod lru_cache;
pub mod models;
pub mod navigator;
pub mod request_queue;
pub mod stats;
pub mod tile;
pub mod viewport;
pub mod year_vendor;

pub use engine::Engine;
pub use error::EngineError;
