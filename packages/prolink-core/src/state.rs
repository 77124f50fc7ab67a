//! Core finder state and configuration.
//!
//! Provides configuration ([`FinderConfig`]) and the concurrent state the
//! finder maintains ([`FinderState`]): the hot cache of deck metadata, the
//! mount set, attached archives, and the in-flight request set.
//!
//! # Concurrency design
//!
//! All containers are concurrent maps/sets so that snapshot readers never
//! block the status handler. Mutation is still centralized: only the
//! handler task and explicit attach/detach calls write here, and the
//! [`MetadataFinder`](crate::services::metadata_finder::MetadataFinder)
//! emits the matching notifications for every mutation it makes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::archive::MetadataArchive;
use crate::model::TrackMetadata;
use crate::refs::{DeckRef, DeviceId, SlotRef, TrackRef};

/// Configuration for the metadata finder.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FinderConfig {
    /// Capacity of the bounded status queue. When the queue is full the
    /// newest update is dropped; a later packet carries current state.
    pub queue_capacity: usize,

    /// Start in passive mode, in which observed status updates never
    /// trigger network queries on their own.
    pub passive: bool,
}

impl FinderConfig {
    /// Creates a new `FinderConfig` with validated values.
    ///
    /// # Errors
    ///
    /// Returns an error if any value would cause runtime issues.
    pub fn new(queue_capacity: usize, passive: bool) -> Result<Self, String> {
        let config = Self {
            queue_capacity,
            passive,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be >= 1 (mpsc::channel panics on 0)".to_string());
        }
        Ok(())
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            passive: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Finder Runtime State
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime state for the decks, mounts, and archives the finder tracks.
#[derive(Debug, Default)]
pub struct FinderState {
    /// Metadata per deck. Hot cue aliases share the `Arc` of the metadata
    /// that populated them, so flushes compare identity cleanly.
    hot_cache: DashMap<DeckRef, Arc<TrackMetadata>>,
    /// Slots currently reporting mounted media.
    mounts: DashSet<SlotRef>,
    /// Attached metadata archives by slot.
    archives: DashMap<SlotRef, Arc<MetadataArchive>>,
    /// Source devices with a fetch currently outstanding.
    active_requests: DashSet<DeviceId>,
}

impl FinderState {
    /// Creates empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Hot cache ───────────────────────────────────────────────────────────

    /// The metadata a deck currently maps to.
    #[must_use]
    pub fn deck(&self, deck: DeckRef) -> Option<Arc<TrackMetadata>> {
        self.hot_cache.get(&deck).map(|entry| Arc::clone(&entry))
    }

    /// The metadata of a device's main deck.
    #[must_use]
    pub fn main_deck(&self, device: DeviceId) -> Option<Arc<TrackMetadata>> {
        self.deck(DeckRef::main(device))
    }

    /// Installs metadata on a device's main deck and on every hot cue deck
    /// the metadata's cue list names.
    pub fn update(&self, device: DeviceId, metadata: Arc<TrackMetadata>) {
        self.hot_cache
            .insert(DeckRef::main(device), Arc::clone(&metadata));
        if let Some(cues) = metadata.cue_list() {
            for entry in cues.entries() {
                if entry.hot_cue_number != 0 {
                    self.hot_cache.insert(
                        DeckRef::hot_cue(device, entry.hot_cue_number),
                        Arc::clone(&metadata),
                    );
                }
            }
        }
    }

    /// Removes the main deck mapping of a device, leaving hot cue aliases
    /// in place. Returns the metadata that was removed.
    pub fn clear_deck(&self, device: DeviceId) -> Option<Arc<TrackMetadata>> {
        self.hot_cache
            .remove(&DeckRef::main(device))
            .map(|(_, metadata)| metadata)
    }

    /// Removes every deck belonging to a device. Returns true if the main
    /// deck was among them.
    pub fn clear_device(&self, device: DeviceId) -> bool {
        let decks: Vec<DeckRef> = self
            .hot_cache
            .iter()
            .map(|entry| *entry.key())
            .filter(|deck| deck.device == device)
            .collect();
        let mut had_main = false;
        for deck in decks {
            if self.hot_cache.remove(&deck).is_some() && deck.is_main() {
                had_main = true;
            }
        }
        had_main
    }

    /// Removes every entry whose metadata came from the given slot.
    ///
    /// Keys are collected before any removal so concurrent iteration never
    /// observes a half-flushed map. Returns the removed decks.
    pub fn flush_slot(&self, slot: SlotRef) -> Vec<DeckRef> {
        let decks: Vec<DeckRef> = self
            .hot_cache
            .iter()
            .filter(|entry| entry.value().track().slot_ref() == slot)
            .map(|entry| *entry.key())
            .collect();
        let mut removed = Vec::with_capacity(decks.len());
        for deck in decks {
            if self.hot_cache.remove(&deck).is_some() {
                removed.push(deck);
            }
        }
        removed
    }

    /// Scans the cache for metadata describing the given track.
    ///
    /// Hot cue aliases make this hit for tracks no main deck currently
    /// holds, saving a network fetch.
    #[must_use]
    pub fn find_by_track(&self, track: TrackRef) -> Option<Arc<TrackMetadata>> {
        self.hot_cache
            .iter()
            .find(|entry| entry.value().track() == track)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// An immutable snapshot of the whole hot cache.
    #[must_use]
    pub fn loaded_tracks(&self) -> HashMap<DeckRef, Arc<TrackMetadata>> {
        self.hot_cache
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    /// Removes every hot cache entry. Returns the devices whose main deck
    /// was populated.
    pub fn clear_hot_cache(&self) -> Vec<DeviceId> {
        let mains: Vec<DeviceId> = self
            .hot_cache
            .iter()
            .filter(|entry| entry.key().is_main())
            .map(|entry| entry.key().device)
            .collect();
        self.hot_cache.clear();
        mains
    }

    // ── Mounts ──────────────────────────────────────────────────────────────

    /// Records a slot as mounted. Returns true on a transition.
    pub fn mount(&self, slot: SlotRef) -> bool {
        self.mounts.insert(slot)
    }

    /// Records a slot as unmounted. Returns true on a transition.
    pub fn unmount(&self, slot: SlotRef) -> bool {
        self.mounts.remove(&slot).is_some()
    }

    /// Whether a slot currently reports mounted media.
    #[must_use]
    pub fn is_mounted(&self, slot: SlotRef) -> bool {
        self.mounts.contains(&slot)
    }

    /// An immutable snapshot of the mounted slots.
    #[must_use]
    pub fn mounted_slots(&self) -> HashSet<SlotRef> {
        self.mounts.iter().map(|slot| *slot).collect()
    }

    /// Clears the mount set, returning what was mounted.
    pub fn clear_mounts(&self) -> Vec<SlotRef> {
        let mounted: Vec<SlotRef> = self.mounts.iter().map(|slot| *slot).collect();
        self.mounts.clear();
        mounted
    }

    // ── Archives ────────────────────────────────────────────────────────────

    /// Attaches an archive to a slot, returning any prior attachment.
    ///
    /// The prior handle is returned rather than dropped here so the caller
    /// can emit its detach notification; dropping it closes the container
    /// exactly once.
    pub fn attach_archive(
        &self,
        slot: SlotRef,
        archive: Arc<MetadataArchive>,
    ) -> Option<Arc<MetadataArchive>> {
        self.archives.insert(slot, archive)
    }

    /// Detaches and returns the archive of a slot, if one is attached.
    pub fn detach_archive(&self, slot: SlotRef) -> Option<Arc<MetadataArchive>> {
        self.archives.remove(&slot).map(|(_, archive)| archive)
    }

    /// The archive attached to a slot, if any.
    #[must_use]
    pub fn archive_for(&self, slot: SlotRef) -> Option<Arc<MetadataArchive>> {
        self.archives.get(&slot).map(|entry| Arc::clone(&entry))
    }

    /// The slots that currently have an archive attached.
    #[must_use]
    pub fn attached_slots(&self) -> Vec<SlotRef> {
        self.archives.iter().map(|entry| *entry.key()).collect()
    }

    // ── Active requests ─────────────────────────────────────────────────────

    /// Claims the single fetch slot for a source device. Returns false if a
    /// fetch is already outstanding.
    pub fn begin_request(&self, device: DeviceId) -> bool {
        self.active_requests.insert(device)
    }

    /// Releases the fetch slot for a source device.
    pub fn end_request(&self, device: DeviceId) {
        self.active_requests.remove(&device);
    }

    /// Whether a fetch is outstanding for a source device.
    #[must_use]
    pub fn request_active(&self, device: DeviceId) -> bool {
        self.active_requests.contains(&device)
    }

    // ── Diagnostics ─────────────────────────────────────────────────────────

    /// Serializes a summary of the current state to JSON.
    ///
    /// Intended for diagnostics; values are summaries, not full metadata.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let decks: serde_json::Map<String, serde_json::Value> = self
            .hot_cache
            .iter()
            .map(|entry| {
                let metadata = entry.value();
                (
                    entry.key().to_string(),
                    json!({
                        "track": metadata.track(),
                        "title": metadata.title(),
                        "artist": metadata.artist(),
                    }),
                )
            })
            .collect();
        let archives: serde_json::Map<String, serde_json::Value> = self
            .archives
            .iter()
            .map(|entry| {
                (
                    entry.key().to_string(),
                    json!(entry.value().path().display().to_string()),
                )
            })
            .collect();
        json!({
            "decks": decks,
            "mounts": self.mounts.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            "archives": archives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{item_type, kind};
    use crate::protocol::{Field, Message};
    use crate::refs::SlotKind;
    use bytes::{BufMut, BytesMut};

    fn metadata_with_cues(track: TrackRef, cues: &[(u32, u8)]) -> Arc<TrackMetadata> {
        let title = Message::response(
            0,
            kind::MENU_ITEM,
            vec![
                Field::U32(0),
                Field::U32(track.rekordbox_id),
                Field::Text("Demo Track".into()),
                Field::Text(String::new()),
                Field::U16(item_type::TITLE),
                Field::U32(0),
                Field::U32(0),
            ],
        );
        let cue_list = if cues.is_empty() {
            None
        } else {
            let mut payload = BytesMut::new();
            for (time, number) in cues {
                payload.put_u32(*time);
                payload.put_u8(*number);
                payload.put_slice(&[0, 0, 0]);
            }
            let message = Message::response(
                0,
                kind::CUE_LIST,
                vec![Field::U32(cues.len() as u32), Field::Blob(payload.freeze())],
            );
            Some(crate::model::CueList::from_message(message).unwrap())
        };
        Arc::new(TrackMetadata::from_items(track, vec![title], cue_list))
    }

    fn track(device: u8, slot: SlotKind, id: u32) -> TrackRef {
        TrackRef::new(DeviceId::new(device), slot, id)
    }

    #[test]
    fn update_installs_main_deck_and_hot_cue_aliases() {
        let state = FinderState::new();
        let device = DeviceId::new(2);
        let metadata = metadata_with_cues(track(3, SlotKind::Usb, 42), &[(1_000, 0), (9_000, 2)]);

        state.update(device, Arc::clone(&metadata));

        assert!(Arc::ptr_eq(&state.main_deck(device).unwrap(), &metadata));
        let alias = state.deck(DeckRef::hot_cue(device, 2)).unwrap();
        assert!(Arc::ptr_eq(&alias, &metadata));
        assert!(state.deck(DeckRef::hot_cue(device, 1)).is_none());
    }

    #[test]
    fn clear_deck_leaves_hot_cue_aliases() {
        let state = FinderState::new();
        let device = DeviceId::new(2);
        let metadata = metadata_with_cues(track(3, SlotKind::Usb, 42), &[(9_000, 2)]);
        state.update(device, metadata);

        assert!(state.clear_deck(device).is_some());
        assert!(state.main_deck(device).is_none());
        assert!(state.deck(DeckRef::hot_cue(device, 2)).is_some());
    }

    #[test]
    fn clear_device_removes_all_decks() {
        let state = FinderState::new();
        let device = DeviceId::new(2);
        let other = DeviceId::new(3);
        state.update(
            device,
            metadata_with_cues(track(3, SlotKind::Usb, 42), &[(9_000, 2)]),
        );
        state.update(other, metadata_with_cues(track(3, SlotKind::Usb, 7), &[]));

        assert!(state.clear_device(device));
        assert!(state.loaded_tracks().keys().all(|deck| deck.device == other));
    }

    #[test]
    fn flush_slot_removes_only_matching_sources() {
        let state = FinderState::new();
        let usb = metadata_with_cues(track(1, SlotKind::Usb, 42), &[(9_000, 3)]);
        let sd = metadata_with_cues(track(1, SlotKind::Sd, 7), &[]);
        state.update(DeviceId::new(2), usb);
        state.update(DeviceId::new(4), sd);

        let removed = state.flush_slot(SlotRef::new(DeviceId::new(1), SlotKind::Usb));

        assert_eq!(removed.len(), 2); // main deck and hot cue 3
        assert!(state.main_deck(DeviceId::new(2)).is_none());
        assert!(state.main_deck(DeviceId::new(4)).is_some());
    }

    #[test]
    fn find_by_track_hits_hot_cue_aliases() {
        let state = FinderState::new();
        let device = DeviceId::new(2);
        let wanted = track(3, SlotKind::Usb, 42);
        state.update(device, metadata_with_cues(wanted, &[(9_000, 2)]));
        state.clear_deck(device);

        let found = state.find_by_track(wanted).unwrap();
        assert_eq!(found.track(), wanted);
        assert!(state.find_by_track(track(3, SlotKind::Usb, 43)).is_none());
    }

    #[test]
    fn mount_transitions_are_reported_once() {
        let state = FinderState::new();
        let slot = SlotRef::new(DeviceId::new(1), SlotKind::Sd);

        assert!(state.mount(slot));
        assert!(!state.mount(slot));
        assert!(state.unmount(slot));
        assert!(!state.unmount(slot));
    }

    #[test]
    fn one_active_request_per_source_device() {
        let state = FinderState::new();
        let device = DeviceId::new(3);

        assert!(state.begin_request(device));
        assert!(state.request_active(device));
        assert!(!state.begin_request(device));

        state.end_request(device);
        assert!(!state.request_active(device));
        assert!(state.begin_request(device));
    }

    #[test]
    fn config_rejects_zero_capacity() {
        assert!(FinderConfig::new(0, false).is_err());
        assert!(FinderConfig::new(100, true).is_ok());
        assert!(FinderConfig::default().validate().is_ok());
    }
}
