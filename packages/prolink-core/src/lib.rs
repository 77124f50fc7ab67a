//! Prolink Core - shared library for Prolink Watch.
//!
//! This crate provides the core functionality for Prolink Watch, a system
//! that observes a Pro DJ Link network of DJ playback devices and maintains
//! a live, coherent picture of the audio tracks loaded on each deck. It
//! answers "what is loaded where?" on demand, fetches rich metadata (track
//! info, cue points, beat grids, waveforms, album art) over the players'
//! database protocol, and can bake that metadata into self-contained
//! archives served entirely from disk when the player network is saturated.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`refs`]: Identifier value types for devices, slots, decks, and tracks
//! - [`status`]: The decoded status packets the finder consumes
//! - [`protocol`]: The wire message model and client session traits
//! - [`fetch`]: Single-track queries against a borrowed session
//! - [`model`]: Parsed metadata values backed by raw responses
//! - [`archive`]: Building and reading on-disk metadata archives
//! - [`state`]: Core finder state and configuration
//! - [`events`]: Listener registries and event values
//! - [`services`]: The metadata finder service itself
//! - [`runtime`]: Scheduling seam between the finder and its host runtime
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple the finder from the
//! components that own the network:
//!
//! - [`ClientPool`](protocol::ClientPool): Borrowing database sessions
//! - [`StatusSource`](sources::StatusSource): The status packet stream
//! - [`AnnouncementSource`](sources::AnnouncementSource): Device presence
//! - [`FinderRuntime`](runtime::FinderRuntime): Scheduling loops and workers

#![warn(clippy::all)]

pub mod archive;
pub mod error;
pub mod events;
pub mod fetch;
pub mod model;
pub mod protocol;
pub mod refs;
pub mod runtime;
pub mod services;
pub mod sources;
pub mod state;
pub mod status;

#[cfg(test)]
pub(crate) mod sim;

// Re-export commonly used types at the crate root
pub use archive::{
    build_archive, ArchiveError, ArchiveProgressListener, ArchiveResult, BuildOutcome,
    MetadataArchive,
};
pub use error::{FinderError, FinderResult};
pub use events::{
    ArchiveEvent, ArchiveListener, LifecycleEvent, LifecycleListener, ListenerRegistry,
    MetadataListener, MetadataUpdate, MountEvent, MountListener,
};
pub use model::{
    AlbumArt, BeatGrid, CueEntry, CueList, TrackMetadata, WaveformDetail, WaveformPreview,
};
pub use protocol::{Client, ClientError, ClientPool, ClientResult, Field, Message, ProtocolError};
pub use refs::{DeckRef, DeviceId, SlotKind, SlotRef, TrackRef};
pub use runtime::{FinderRuntime, FinderTask, TokioRuntime};
pub use services::MetadataFinder;
pub use sources::{AnnouncementSource, StatusSource};
pub use state::{FinderConfig, FinderState};
pub use status::{CdjStatus, MediaFlag, TrackType};
