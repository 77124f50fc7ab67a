//! Event values and listener registries.
//!
//! The finder notifies four listener sets: mounts, archives, metadata, and
//! lifecycle. Delivery is synchronous on the thread that mutated the state
//! (the handler task for pipeline-driven changes, the caller for
//! user-driven ones), so listeners must be fast. Moving delivery to a pool
//! would break the per-deck ordering guarantees callers rely on.
//!
//! Listener iteration is over a point-in-time snapshot: registering or
//! removing a listener during delivery affects the next delivery, not the
//! current one. A panicking listener is caught and logged, and does not
//! affect other listeners.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::TrackMetadata;
use crate::refs::{DeviceId, SlotRef};

/// A slot's media mount state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountEvent {
    /// Media appeared in the slot.
    Mounted(SlotRef),
    /// Media disappeared from the slot.
    Unmounted(SlotRef),
}

/// An archive attachment changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    /// An archive now serves reads for the slot.
    Attached {
        /// The slot the archive covers.
        slot: SlotRef,
        /// The file the archive was opened from.
        path: PathBuf,
    },
    /// The slot's archive was closed and removed.
    Detached {
        /// The slot that lost its archive.
        slot: SlotRef,
    },
}

/// A device's main deck metadata changed.
#[derive(Debug, Clone)]
pub struct MetadataUpdate {
    /// The device whose main deck changed.
    pub device: DeviceId,
    /// The new metadata, or `None` when the deck was cleared.
    pub metadata: Option<Arc<TrackMetadata>>,
}

/// The finder started or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The finder is running and processing updates.
    Started,
    /// The finder stopped; all state was cleared.
    Stopped,
}

/// Receives media mount notifications.
pub trait MountListener: Send + Sync {
    /// Called for each mount transition, exactly once per transition.
    fn mount_changed(&self, event: &MountEvent);
}

/// Receives archive attach/detach notifications.
pub trait ArchiveListener: Send + Sync {
    /// Called when an archive is attached or detached.
    fn archive_changed(&self, event: &ArchiveEvent);
}

/// Receives main-deck metadata notifications.
pub trait MetadataListener: Send + Sync {
    /// Called whenever a device's main deck mapping changes.
    fn metadata_changed(&self, update: &MetadataUpdate);
}

/// Receives finder lifecycle notifications.
pub trait LifecycleListener: Send + Sync {
    /// Called when the finder starts or stops.
    fn lifecycle_changed(&self, event: &LifecycleEvent);
}

/// The four listener sets and their delivery rules.
///
/// Registration is idempotent by listener identity; registering the same
/// `Arc` twice keeps one entry.
#[derive(Default)]
pub struct ListenerRegistry {
    mount: RwLock<Vec<Arc<dyn MountListener>>>,
    archive: RwLock<Vec<Arc<dyn ArchiveListener>>>,
    metadata: RwLock<Vec<Arc<dyn MetadataListener>>>,
    lifecycle: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mount listener.
    pub fn add_mount_listener(&self, listener: Arc<dyn MountListener>) {
        add(&self.mount, listener);
    }

    /// Removes a mount listener.
    pub fn remove_mount_listener(&self, listener: &Arc<dyn MountListener>) {
        remove(&self.mount, listener);
    }

    /// Registers an archive listener.
    pub fn add_archive_listener(&self, listener: Arc<dyn ArchiveListener>) {
        add(&self.archive, listener);
    }

    /// Removes an archive listener.
    pub fn remove_archive_listener(&self, listener: &Arc<dyn ArchiveListener>) {
        remove(&self.archive, listener);
    }

    /// Registers a metadata listener.
    pub fn add_metadata_listener(&self, listener: Arc<dyn MetadataListener>) {
        add(&self.metadata, listener);
    }

    /// Removes a metadata listener.
    pub fn remove_metadata_listener(&self, listener: &Arc<dyn MetadataListener>) {
        remove(&self.metadata, listener);
    }

    /// Registers a lifecycle listener.
    pub fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        add(&self.lifecycle, listener);
    }

    /// Removes a lifecycle listener.
    pub fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) {
        remove(&self.lifecycle, listener);
    }

    /// Delivers a mount event to a snapshot of the mount listeners.
    pub fn emit_mount(&self, event: &MountEvent) {
        tracing::debug!(?event, "mount_event");
        deliver(&self.mount, "mount", |listener| {
            listener.mount_changed(event);
        });
    }

    /// Delivers an archive event to a snapshot of the archive listeners.
    pub fn emit_archive(&self, event: &ArchiveEvent) {
        tracing::debug!(?event, "archive_event");
        deliver(&self.archive, "archive", |listener| {
            listener.archive_changed(event);
        });
    }

    /// Delivers a metadata update to a snapshot of the metadata listeners.
    pub fn emit_metadata(&self, update: &MetadataUpdate) {
        tracing::debug!(device = %update.device, loaded = update.metadata.is_some(), "metadata_event");
        deliver(&self.metadata, "metadata", |listener| {
            listener.metadata_changed(update);
        });
    }

    /// Delivers a lifecycle event to a snapshot of the lifecycle listeners.
    pub fn emit_lifecycle(&self, event: &LifecycleEvent) {
        tracing::debug!(?event, "lifecycle_event");
        deliver(&self.lifecycle, "lifecycle", |listener| {
            listener.lifecycle_changed(event);
        });
    }
}

fn add<L: ?Sized>(set: &RwLock<Vec<Arc<L>>>, listener: Arc<L>) {
    let mut set = set.write();
    if !set.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
        set.push(listener);
    }
}

fn remove<L: ?Sized>(set: &RwLock<Vec<Arc<L>>>, listener: &Arc<L>) {
    set.write()
        .retain(|existing| !Arc::ptr_eq(existing, listener));
}

fn deliver<L: ?Sized>(set: &RwLock<Vec<Arc<L>>>, what: &str, call: impl Fn(&Arc<L>)) {
    let snapshot: Vec<Arc<L>> = set.read().clone();
    for listener in &snapshot {
        if catch_unwind(AssertUnwindSafe(|| call(listener))).is_err() {
            log::warn!("[ListenerRegistry] A {what} listener panicked during delivery");
        }
    }
}
