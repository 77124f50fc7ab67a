//! The metadata finder service.
//!
//! Responsibilities:
//! - Ingesting status updates through a bounded queue
//! - Deciding per update whether to clear, reuse, or fetch deck metadata
//! - Keeping the hot cache, mount set, and archive attachments coherent
//! - Dispatching fetches to the pooled database client, redirecting to
//!   attached archives when available
//! - Emitting mount, archive, metadata, and lifecycle notifications
//!
//! One handler task is the sole pipeline-driven mutator of the state;
//! status delivery threads only enqueue. Fetches run on short-lived worker
//! tasks, at most one per source device.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::archive::{build_archive, ArchiveProgressListener, BuildOutcome, MetadataArchive};
use crate::error::{FinderError, FinderResult};
use crate::events::{
    ArchiveEvent, ArchiveListener, LifecycleEvent, LifecycleListener, ListenerRegistry,
    MetadataListener, MetadataUpdate, MountEvent, MountListener,
};
use crate::fetch;
use crate::model::{AlbumArt, TrackMetadata};
use crate::protocol::{ClientPool, Message};
use crate::refs::{DeckRef, DeviceId, SlotKind, SlotRef, TrackRef};
use crate::runtime::FinderRuntime;
use crate::sources::{AnnouncementSource, StatusSource};
use crate::state::{FinderConfig, FinderState};
use crate::status::{CdjStatus, MediaFlag};

/// Watches player status updates and keeps a live picture of the track
/// metadata loaded on every deck.
///
/// A finder is a constructed value owned by the application; the status
/// source, announcement source, and client pool are injected. Create one,
/// register listeners, and call [`start`](Self::start).
pub struct MetadataFinder {
    config: FinderConfig,
    state: Arc<FinderState>,
    listeners: ListenerRegistry,
    pool: Arc<dyn ClientPool>,
    status_source: Arc<dyn StatusSource>,
    announcements: Arc<dyn AnnouncementSource>,
    runtime: Arc<dyn FinderRuntime>,
    running: AtomicBool,
    passive: AtomicBool,
    queue_tx: Mutex<Option<mpsc::Sender<CdjStatus>>>,
    shutdown: Mutex<Option<CancellationToken>>,
}

impl MetadataFinder {
    /// Creates a finder wired to the given sources and session pool.
    ///
    /// The finder is returned stopped; nothing is processed until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(
        config: FinderConfig,
        pool: Arc<dyn ClientPool>,
        status_source: Arc<dyn StatusSource>,
        announcements: Arc<dyn AnnouncementSource>,
        runtime: Arc<dyn FinderRuntime>,
    ) -> Arc<Self> {
        let passive = config.passive;
        Arc::new(Self {
            config,
            state: Arc::new(FinderState::new()),
            listeners: ListenerRegistry::new(),
            pool,
            status_source,
            announcements,
            runtime,
            running: AtomicBool::new(false),
            passive: AtomicBool::new(passive),
            queue_tx: Mutex::new(None),
            shutdown: Mutex::new(None),
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Starts the finder: subscribes to the upstream sources and launches
    /// the status handler. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, mut rx) = mpsc::channel(self.config.queue_capacity);
        *self.queue_tx.lock() = Some(tx);
        let token = CancellationToken::new();
        *self.shutdown.lock() = Some(token.clone());

        // Forward upstream status packets onto the bounded queue. The
        // forwarder does the enqueue the delivery thread would do in a
        // direct wiring; it never blocks on the queue.
        let finder = Arc::clone(self);
        let mut status_rx = self.status_source.subscribe();
        let forwarder_token = token.clone();
        self.runtime.spawn_loop(
            "status-forwarder",
            Box::pin(async move {
                loop {
                    tokio::select! {
                        _ = forwarder_token.cancelled() => break,
                        received = status_rx.recv() => match received {
                            Ok(status) => {
                                finder.deliver_status(status);
                            }
                            Err(broadcast::error::RecvError::Lagged(missed)) => {
                                log::warn!(
                                    "[MetadataFinder] Status subscription lagged; {missed} updates skipped"
                                );
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
            }),
        );

        // Forward device-disappearance notifications.
        let finder = Arc::clone(self);
        let mut lost_rx = self.announcements.subscribe_lost();
        let lost_token = token.clone();
        self.runtime.spawn_loop(
            "device-lost-forwarder",
            Box::pin(async move {
                loop {
                    tokio::select! {
                        _ = lost_token.cancelled() => break,
                        received = lost_rx.recv() => match received {
                            Ok(device) => finder.handle_device_lost(device),
                            Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
            }),
        );

        // The handler task: sole pipeline-driven mutator of the state.
        let finder = Arc::clone(self);
        self.runtime.spawn_loop(
            "status-handler",
            Box::pin(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        next = rx.recv() => match next {
                            Some(status) => finder.handle_status(status),
                            None => break,
                        },
                    }
                }
                log::debug!("[MetadataFinder] Status handler exited");
            }),
        );

        log::info!(
            "[MetadataFinder] Started (queue capacity {}, passive {})",
            self.config.queue_capacity,
            self.is_passive()
        );
        self.listeners.emit_lifecycle(&LifecycleEvent::Started);
    }

    /// Stops the finder: shuts the pipeline down, clears all state, and
    /// notifies listeners that every deck is now empty. Idempotent.
    ///
    /// Archive builds in flight are not waited for; they observe the
    /// cancellation through their own progress listeners.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(token) = self.shutdown.lock().take() {
            token.cancel();
        }
        // Dropping the sender closes the queue and discards anything still
        // pending; a stopped finder owes nobody those updates.
        *self.queue_tx.lock() = None;

        for slot in self.state.attached_slots() {
            if self.state.detach_archive(slot).is_some() {
                self.listeners.emit_archive(&ArchiveEvent::Detached { slot });
            }
        }
        for device in self.state.clear_hot_cache() {
            self.notify_deck(device, None);
        }
        self.state.clear_mounts();

        log::info!("[MetadataFinder] Stopped");
        self.listeners.emit_lifecycle(&LifecycleEvent::Stopped);
    }

    /// Whether the finder is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the finder is in passive mode.
    ///
    /// Passive mode forbids network queries in response to observed status
    /// updates. Explicit requests and archive builds still proceed.
    #[must_use]
    pub fn is_passive(&self) -> bool {
        self.passive.load(Ordering::SeqCst)
    }

    /// Switches passive mode on or off.
    pub fn set_passive(&self, passive: bool) {
        self.passive.store(passive, Ordering::SeqCst);
        log::info!("[MetadataFinder] Passive mode set to {passive}");
    }

    // ── Status ingestion ────────────────────────────────────────────────────

    /// Enqueues a status update for processing.
    ///
    /// Called by the upstream delivery thread (or the internal forwarder);
    /// returns immediately. When the queue is full the update is dropped
    /// with a warning, which is safe because a later packet carries current
    /// state. Returns whether the update was accepted.
    pub fn deliver_status(&self, status: CdjStatus) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(tx) = self.queue_tx.lock().clone() else {
            return false;
        };
        match tx.try_send(status) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                log::warn!(
                    "[MetadataFinder] Status queue full; dropping update from {}",
                    dropped.device
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Processes one status update. Runs only on the handler task.
    fn handle_status(self: &Arc<Self>, status: CdjStatus) {
        let device = status.device;

        // Slot-mount bookkeeping for the reporting device's own slots.
        for kind in [SlotKind::Usb, SlotKind::Sd] {
            let slot = SlotRef::new(device, kind);
            match status.media_flag(kind) {
                MediaFlag::Empty => self.handle_slot_emptied(slot),
                MediaFlag::Loaded => {
                    if self.state.mount(slot) {
                        log::info!("[MetadataFinder] Media mounted in {slot}");
                        self.listeners.emit_mount(&MountEvent::Mounted(slot));
                    }
                }
                MediaFlag::Unknown => {}
            }
        }

        // Track-loaded decision.
        let Some(track) = status.track_ref() else {
            if self.state.clear_deck(device).is_some() {
                self.notify_deck(device, None);
            }
            return;
        };

        // Dedup against what the deck already holds.
        if let Some(current) = self.state.main_deck(device) {
            if current.track() == track {
                return;
            }
        }

        // A hot cue (or another deck) may already hold this track.
        if let Some(cached) = self.state.find_by_track(track) {
            log::debug!("[MetadataFinder] Serving {track} for {device} from the hot cache");
            self.install(device, cached);
            return;
        }

        // Fetch, unless one is already outstanding for the source device.
        if !self.state.begin_request(track.source_device) {
            log::debug!(
                "[MetadataFinder] A fetch is already outstanding for {}; skipping",
                track.source_device
            );
            return;
        }
        if self.state.clear_deck(device).is_some() {
            self.notify_deck(device, None);
        }
        let finder = Arc::clone(self);
        self.runtime.spawn_worker(
            "metadata-fetch",
            Box::pin(async move {
                match finder.request_metadata_internal(track, true).await {
                    Ok(Some(metadata)) => {
                        if finder.is_running() {
                            finder.install(device, Arc::new(metadata));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("[MetadataFinder] Fetching metadata for {track} failed: {e}");
                    }
                }
                finder.state.end_request(track.source_device);
            }),
        );
    }

    /// Applies an observed "slot empty" transition: detaches the slot's
    /// archive, flushes metadata sourced from it, and removes the mount.
    fn handle_slot_emptied(&self, slot: SlotRef) {
        if self.state.detach_archive(slot).is_some() {
            log::info!("[MetadataFinder] Media left {slot}; detaching its archive");
            self.listeners.emit_archive(&ArchiveEvent::Detached { slot });
        }
        for deck in self.state.flush_slot(slot) {
            if deck.is_main() {
                self.notify_deck(deck.device, None);
            }
        }
        if self.state.unmount(slot) {
            self.listeners.emit_mount(&MountEvent::Unmounted(slot));
        }
    }

    /// Evicts everything belonging to a device that disappeared from the
    /// network.
    pub fn handle_device_lost(&self, device: DeviceId) {
        log::info!("[MetadataFinder] {device} disappeared; evicting its state");
        if self.state.clear_device(device) {
            self.notify_deck(device, None);
        }
        for kind in [SlotKind::Usb, SlotKind::Sd] {
            let slot = SlotRef::new(device, kind);
            if self.state.detach_archive(slot).is_some() {
                self.listeners.emit_archive(&ArchiveEvent::Detached { slot });
            }
            if self.state.unmount(slot) {
                self.listeners.emit_mount(&MountEvent::Unmounted(slot));
            }
        }
    }

    /// Installs metadata on a device's main deck (and hot cue aliases) and
    /// notifies.
    fn install(&self, device: DeviceId, metadata: Arc<TrackMetadata>) {
        self.state.update(device, Arc::clone(&metadata));
        self.notify_deck(device, Some(metadata));
    }

    fn notify_deck(&self, device: DeviceId, metadata: Option<Arc<TrackMetadata>>) {
        self.listeners
            .emit_metadata(&MetadataUpdate { device, metadata });
    }

    // ── Metadata requests ───────────────────────────────────────────────────

    /// Fetches the metadata for a track, from an attached archive when one
    /// covers the track's slot, otherwise from the network.
    ///
    /// Unlike pipeline-driven fetches this proceeds even in passive mode.
    ///
    /// # Errors
    ///
    /// [`FinderError::NotRunning`] when stopped; session and codec failures
    /// pass through.
    pub async fn request_metadata(&self, track: TrackRef) -> FinderResult<Option<Arc<TrackMetadata>>> {
        self.require_running()?;
        if let Some(cached) = self.state.find_by_track(track) {
            return Ok(Some(cached));
        }
        Ok(self
            .request_metadata_internal(track, false)
            .await?
            .map(Arc::new))
    }

    /// The shared fetch path for workers and explicit requests.
    async fn request_metadata_internal(
        &self,
        track: TrackRef,
        fail_if_passive: bool,
    ) -> FinderResult<Option<TrackMetadata>> {
        if let Some(archive) = self.state.archive_for(track.slot_ref()) {
            log::debug!(
                "[MetadataFinder] Serving {track} from archive {}",
                archive.path().display()
            );
            return Ok(archive.read_metadata(track));
        }
        if fail_if_passive && self.is_passive() {
            log::debug!("[MetadataFinder] Passive mode; not querying for {track}");
            return Ok(None);
        }
        let mut client = self.pool.session(track.source_device).await?;
        Ok(fetch::query_metadata(client.as_mut(), track).await?)
    }

    /// Fetches the full track listing of a slot.
    pub async fn request_track_list(&self, slot: SlotRef) -> FinderResult<Vec<Message>> {
        self.require_running()?;
        let mut client = self.pool.session(slot.device).await?;
        Ok(fetch::query_full_track_list(client.as_mut(), slot).await?)
    }

    /// Fetches the entries of a playlist on a slot.
    pub async fn request_playlist_items(
        &self,
        slot: SlotRef,
        playlist_id: u32,
    ) -> FinderResult<Vec<Message>> {
        self.require_running()?;
        let mut client = self.pool.session(slot.device).await?;
        Ok(fetch::query_playlist(client.as_mut(), slot, 0, playlist_id, false).await?)
    }

    /// Fetches an album art image, from an attached archive when one covers
    /// the slot.
    pub async fn request_artwork(
        &self,
        slot: SlotRef,
        artwork_id: u32,
    ) -> FinderResult<Option<AlbumArt>> {
        self.require_running()?;
        if let Some(archive) = self.state.archive_for(slot) {
            return Ok(archive.read_artwork(artwork_id));
        }
        let mut client = self.pool.session(slot.device).await?;
        Ok(fetch::query_artwork(client.as_mut(), slot, artwork_id).await?)
    }

    // ── Archives ────────────────────────────────────────────────────────────

    /// Attaches a metadata archive to a slot, so that queries for tracks on
    /// that slot are served from disk instead of the player.
    ///
    /// Replaces (and closes) any prior attachment for the slot.
    ///
    /// # Errors
    ///
    /// [`FinderError::BadArgument`] for slots that cannot host archives or
    /// devices outside 1-4, [`FinderError::DeviceNotFound`] when the device
    /// is not announced, and [`ArchiveError::BadFormat`] when the file does
    /// not carry the expected format tag.
    ///
    /// [`ArchiveError::BadFormat`]: crate::archive::ArchiveError::BadFormat
    pub fn attach_archive(&self, slot: SlotRef, path: impl AsRef<Path>) -> FinderResult<()> {
        self.require_running()?;
        if !slot.slot.supports_archives() {
            return Err(FinderError::BadArgument(format!(
                "archives cannot be attached to {} slots",
                slot.slot
            )));
        }
        if !slot.device.is_physical_player() {
            return Err(FinderError::BadArgument(format!(
                "{} is not a physical player",
                slot.device
            )));
        }
        if !self.announcements.is_announced(slot.device) {
            return Err(FinderError::DeviceNotFound(slot.device));
        }

        let path = path.as_ref().to_path_buf();
        let archive = Arc::new(MetadataArchive::open(&path)?);
        // Replacement closes the old handle exactly once, when the Arc
        // returned here is dropped.
        let _previous = self.state.attach_archive(slot, archive);
        log::info!(
            "[MetadataFinder] Attached archive {} to {slot}",
            path.display()
        );
        self.listeners
            .emit_archive(&ArchiveEvent::Attached { slot, path });
        Ok(())
    }

    /// Detaches (and closes) the archive of a slot. Idempotent.
    pub fn detach_archive(&self, slot: SlotRef) {
        if self.state.detach_archive(slot).is_some() {
            log::info!("[MetadataFinder] Detached archive from {slot}");
            self.listeners.emit_archive(&ArchiveEvent::Detached { slot });
        }
    }

    /// The archive currently attached to a slot, if any.
    #[must_use]
    pub fn get_archive(&self, slot: SlotRef) -> Option<Arc<MetadataArchive>> {
        self.state.archive_for(slot)
    }

    /// Builds a metadata archive of a slot (or of one playlist when
    /// `playlist_id` is non-zero) into `path`.
    ///
    /// Requires passive mode: builds are long, and competing with live
    /// fetches for the device would starve both.
    ///
    /// # Errors
    ///
    /// [`FinderError::NotRunning`] when stopped, [`FinderError::NotPassive`]
    /// when live fetches are enabled, [`FinderError::BadArgument`] for
    /// slots that cannot host archives; build failures pass through.
    pub async fn create_archive(
        &self,
        slot: SlotRef,
        playlist_id: u32,
        path: impl AsRef<Path>,
        listener: Option<&dyn ArchiveProgressListener>,
    ) -> FinderResult<BuildOutcome> {
        self.require_running()?;
        if !self.is_passive() {
            return Err(FinderError::NotPassive);
        }
        if !slot.slot.supports_archives() {
            return Err(FinderError::BadArgument(format!(
                "archives cannot be built from {} slots",
                slot.slot
            )));
        }
        let mut client = self.pool.session(slot.device).await?;
        build_archive(client.as_mut(), slot, playlist_id, path.as_ref(), listener).await
    }

    // ── Snapshot readers ────────────────────────────────────────────────────

    /// An immutable snapshot of every deck's metadata.
    #[must_use]
    pub fn loaded_tracks(&self) -> std::collections::HashMap<DeckRef, Arc<TrackMetadata>> {
        self.state.loaded_tracks()
    }

    /// The metadata on a device's main deck, if any.
    #[must_use]
    pub fn latest_metadata_for(&self, device: DeviceId) -> Option<Arc<TrackMetadata>> {
        self.state.main_deck(device)
    }

    /// An immutable snapshot of the slots reporting mounted media.
    #[must_use]
    pub fn mounted_slots(&self) -> std::collections::HashSet<SlotRef> {
        self.state.mounted_slots()
    }

    /// Serializes a diagnostic summary of the finder's state to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        self.state.to_json()
    }

    // ── Listeners ───────────────────────────────────────────────────────────

    /// Registers a mount listener. Idempotent.
    pub fn add_mount_listener(&self, listener: Arc<dyn MountListener>) {
        self.listeners.add_mount_listener(listener);
    }

    /// Removes a mount listener.
    pub fn remove_mount_listener(&self, listener: &Arc<dyn MountListener>) {
        self.listeners.remove_mount_listener(listener);
    }

    /// Registers an archive listener. Idempotent.
    pub fn add_archive_listener(&self, listener: Arc<dyn ArchiveListener>) {
        self.listeners.add_archive_listener(listener);
    }

    /// Removes an archive listener.
    pub fn remove_archive_listener(&self, listener: &Arc<dyn ArchiveListener>) {
        self.listeners.remove_archive_listener(listener);
    }

    /// Registers a metadata listener. Idempotent.
    pub fn add_metadata_listener(&self, listener: Arc<dyn MetadataListener>) {
        self.listeners.add_metadata_listener(listener);
    }

    /// Removes a metadata listener.
    pub fn remove_metadata_listener(&self, listener: &Arc<dyn MetadataListener>) {
        self.listeners.remove_metadata_listener(listener);
    }

    /// Registers a lifecycle listener. Idempotent.
    pub fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.add_lifecycle_listener(listener);
    }

    /// Removes a lifecycle listener.
    pub fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) {
        self.listeners.remove_lifecycle_listener(listener);
    }

    fn require_running(&self) -> FinderResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(FinderError::NotRunning)
        }
    }
}

impl Drop for MetadataFinder {
    fn drop(&mut self) {
        // Belt and braces: cancel the pipeline if the owner forgot to stop.
        if let Some(token) = self.shutdown.lock().take() {
            token.cancel();
        }
    }
}
