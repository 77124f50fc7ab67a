//! Player status values delivered by the upstream status listener.
//!
//! The finder does not parse status packets itself; the UDP listener that
//! owns the announcement socket decodes them and hands the finder one
//! [`CdjStatus`] value per packet. Only the fields the finder acts on are
//! modeled here.

use serde::{Deserialize, Serialize};

use crate::refs::{DeviceId, SlotKind, TrackRef};

/// The kind of track a player reports having loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    /// Nothing is loaded.
    NoTrack,
    /// An audio CD track; carries no rekordbox metadata.
    Cd,
    /// A file that has not been analyzed by rekordbox.
    Unanalyzed,
    /// A track from a rekordbox library; metadata queries apply.
    Rekordbox,
}

/// The reported presence of media in one of a player's local slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFlag {
    /// Media is mounted in the slot.
    Loaded,
    /// The slot is empty.
    Empty,
    /// The packet did not report a usable value for the slot.
    Unknown,
}

/// One decoded status packet from a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdjStatus {
    /// The device that sent the packet.
    pub device: DeviceId,
    /// The device hosting the media of the loaded track.
    pub track_source_device: DeviceId,
    /// The slot the loaded track was read from.
    pub track_source_slot: SlotKind,
    /// What kind of track is loaded.
    pub track_type: TrackType,
    /// The rekordbox id of the loaded track; 0 when nothing usable is loaded.
    pub rekordbox_id: u32,
    /// Presence of media in the sender's own USB slot.
    pub usb_media: MediaFlag,
    /// Presence of media in the sender's own SD slot.
    pub sd_media: MediaFlag,
}

impl CdjStatus {
    /// The track reference for the loaded track, if the status describes a
    /// track we can fetch metadata for.
    ///
    /// Returns `None` for non-rekordbox tracks, unusable source slots, and
    /// the id-0 "nothing loaded" state; all of those mean the deck should be
    /// treated as empty.
    #[must_use]
    pub fn track_ref(&self) -> Option<TrackRef> {
        if self.track_type != TrackType::Rekordbox {
            return None;
        }
        if matches!(
            self.track_source_slot,
            SlotKind::NoTrack | SlotKind::Unknown
        ) {
            return None;
        }
        if self.rekordbox_id == 0 {
            return None;
        }
        Some(TrackRef::new(
            self.track_source_device,
            self.track_source_slot,
            self.rekordbox_id,
        ))
    }

    /// The media flag the packet reported for one of the sender's own slots.
    ///
    /// Only SD and USB carry mount state; other kinds report `Unknown`.
    #[must_use]
    pub fn media_flag(&self, slot: SlotKind) -> MediaFlag {
        match slot {
            SlotKind::Usb => self.usb_media,
            SlotKind::Sd => self.sd_media,
            _ => MediaFlag::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> CdjStatus {
        CdjStatus {
            device: DeviceId::new(2),
            track_source_device: DeviceId::new(3),
            track_source_slot: SlotKind::Usb,
            track_type: TrackType::Rekordbox,
            rekordbox_id: 42,
            usb_media: MediaFlag::Loaded,
            sd_media: MediaFlag::Empty,
        }
    }

    #[test]
    fn rekordbox_track_yields_track_ref() {
        let track = status().track_ref().unwrap();
        assert_eq!(track.source_device, DeviceId::new(3));
        assert_eq!(track.slot, SlotKind::Usb);
        assert_eq!(track.rekordbox_id, 42);
    }

    #[test]
    fn non_rekordbox_track_yields_none() {
        let mut s = status();
        s.track_type = TrackType::Cd;
        assert!(s.track_ref().is_none());
    }

    #[test]
    fn zero_id_yields_none() {
        let mut s = status();
        s.rekordbox_id = 0;
        assert!(s.track_ref().is_none());
    }

    #[test]
    fn unusable_slot_yields_none() {
        let mut s = status();
        s.track_source_slot = SlotKind::NoTrack;
        assert!(s.track_ref().is_none());
        s.track_source_slot = SlotKind::Unknown;
        assert!(s.track_ref().is_none());
    }

    #[test]
    fn media_flags_only_cover_local_slots() {
        let s = status();
        assert_eq!(s.media_flag(SlotKind::Usb), MediaFlag::Loaded);
        assert_eq!(s.media_flag(SlotKind::Sd), MediaFlag::Empty);
        assert_eq!(s.media_flag(SlotKind::Cd), MediaFlag::Unknown);
    }
}
