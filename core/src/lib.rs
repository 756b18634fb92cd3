//! Chorus Core - shared library for Chorus, a multi-tenant voice-streaming
//! playback engine.
//!
//! This crate provides the core functionality used by a Discord bot's voice
//! pipeline: decoding, caching, per-guild queueing, and per-guild playback
//! state, independent of any specific gateway library.
//!
//! # Architecture
//!
//! - [`runtime`]: Task spawning abstraction for async runtime independence
//! - [`events`]: Domain event system
//! - [`track`]: Immutable track descriptors
//! - [`queue`]: Per-guild play queue (component C)
//! - [`settings`]: Per-guild settings and the `SettingsStore` trait
//! - [`resolver`]: The `Resolver` trait external query resolution implements
//! - [`voice`]: The `VoicePlatform` trait a Discord voice driver implements
//! - [`cache`]: Content-addressed on-disk audio cache (component B)
//! - [`pipeline`]: The audio decode/seek/volume/retry pipeline (component A)
//! - [`player`]: The per-guild player actor (component D)
//! - [`registry`]: The process-wide player registry (component E)
//! - [`commands`]: The command boundary (component F)
//! - [`bootstrap`]: Composition root wiring every service together
//! - [`error`]: Centralized error types
//!
//! # Abstraction traits
//!
//! The crate defines collaborator traits so the playback core stays
//! independent of the concrete Discord library and media resolver:
//!
//! - [`runtime::TaskSpawner`]: spawning background tasks
//! - [`events::EventEmitter`]: emitting domain events
//! - [`voice::VoicePlatform`]: connecting to and playing audio into a voice room
//! - [`resolver::Resolver`]: mapping a user query to playable tracks
//! - [`settings::SettingsStore`]: reading per-guild configuration

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod player;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod settings;
pub mod time;
pub mod track;
pub mod voice;

pub use bootstrap::{bootstrap_services, BootstrappedServices, ExternalServices};
pub use config::Config;
pub use error::{ChorusError, ChorusResult, ErrorCode};
pub use events::{DomainEvent, EventEmitter};
pub use player::{PlayerDeps, PlayerHandle};
pub use registry::{PlayerDepsFactory, PlayerRegistry};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use track::TrackDescriptor;
