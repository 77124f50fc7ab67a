//! Reference types identifying devices, media slots, decks, and tracks.
//!
//! These are small hashable value types used as keys throughout the finder:
//! the hot cache is keyed by [`DeckRef`], mounts and archives by [`SlotRef`],
//! and every piece of fetched metadata carries the [`TrackRef`] it was
//! fetched for.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A player number on the Pro DJ Link network.
///
/// Physical players report numbers 1-4. Other numbers (mixers, rekordbox
/// laptops) can appear in status packets and are carried through unchanged;
/// operations that only make sense against a physical player validate with
/// [`DeviceId::is_physical_player`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Creates a device id from a raw device number.
    #[must_use]
    pub fn new(number: u8) -> Self {
        Self(number)
    }

    /// Returns the raw device number.
    #[must_use]
    pub fn number(self) -> u8 {
        self.0
    }

    /// Returns true if this is a physical player (1-4).
    ///
    /// Archive attachment is only allowed for physical players; elsewhere
    /// out-of-range devices are logged and dropped.
    #[must_use]
    pub fn is_physical_player(self) -> bool {
        (1..=4).contains(&self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// The kind of media slot a track can be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// No track is loaded.
    NoTrack,
    /// The CD drive.
    Cd,
    /// The SD card slot.
    Sd,
    /// The USB port.
    Usb,
    /// The rekordbox collection of a linked computer.
    Collection,
    /// A slot value we do not recognize.
    Unknown,
}

impl SlotKind {
    /// Returns true if media archives can be attached for this slot kind.
    ///
    /// Only removable media (SD and USB) can be baked into an archive.
    #[must_use]
    pub fn supports_archives(self) -> bool {
        matches!(self, SlotKind::Sd | SlotKind::Usb)
    }

    /// The slot code used in protocol request arguments.
    #[must_use]
    pub fn protocol_code(self) -> u8 {
        match self {
            SlotKind::NoTrack => 0,
            SlotKind::Cd => 1,
            SlotKind::Sd => 2,
            SlotKind::Usb => 3,
            SlotKind::Collection => 4,
            SlotKind::Unknown => 0xff,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::NoTrack => "no-track",
            SlotKind::Cd => "cd",
            SlotKind::Sd => "sd",
            SlotKind::Usb => "usb",
            SlotKind::Collection => "collection",
            SlotKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A specific media slot on a specific device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// The device hosting the slot.
    pub device: DeviceId,
    /// Which slot on that device.
    pub slot: SlotKind,
}

impl SlotRef {
    /// Creates a slot reference.
    #[must_use]
    pub fn new(device: DeviceId, slot: SlotKind) -> Self {
        Self { device, slot }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device, self.slot)
    }
}

/// A logical playback surface on a device.
///
/// `hot_cue` 0 is the main deck; 1 and up are hot cue aliases, which hold a
/// reference to the same metadata as the track that populated them and
/// survive main-deck changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeckRef {
    /// The device the deck belongs to.
    pub device: DeviceId,
    /// 0 for the main deck, 1..N for a hot cue alias.
    pub hot_cue: u8,
}

impl DeckRef {
    /// The main deck of a device.
    #[must_use]
    pub fn main(device: DeviceId) -> Self {
        Self { device, hot_cue: 0 }
    }

    /// A hot cue alias deck.
    #[must_use]
    pub fn hot_cue(device: DeviceId, number: u8) -> Self {
        Self {
            device,
            hot_cue: number,
        }
    }

    /// Returns true if this is the main deck rather than a hot cue alias.
    #[must_use]
    pub fn is_main(self) -> bool {
        self.hot_cue == 0
    }
}

impl fmt::Display for DeckRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "{} main deck", self.device)
        } else {
            write!(f, "{} hot cue {}", self.device, self.hot_cue)
        }
    }
}

/// A track identified by where it lives.
///
/// Players can load tracks hosted on another player's media, so a track is
/// identified by the device and slot that host it plus its rekordbox id,
/// never by the device currently playing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRef {
    /// The device hosting the media the track lives on.
    pub source_device: DeviceId,
    /// The slot the media is mounted in.
    pub slot: SlotKind,
    /// The rekordbox library id of the track, unique within that media.
    pub rekordbox_id: u32,
}

impl TrackRef {
    /// Creates a track reference.
    #[must_use]
    pub fn new(source_device: DeviceId, slot: SlotKind, rekordbox_id: u32) -> Self {
        Self {
            source_device,
            slot,
            rekordbox_id,
        }
    }

    /// The slot reference the track's media is mounted in.
    #[must_use]
    pub fn slot_ref(&self) -> SlotRef {
        SlotRef::new(self.source_device, self.slot)
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "track {} on {} {}",
            self.rekordbox_id, self.source_device, self.slot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_player_range() {
        assert!(!DeviceId::new(0).is_physical_player());
        assert!(DeviceId::new(1).is_physical_player());
        assert!(DeviceId::new(4).is_physical_player());
        assert!(!DeviceId::new(5).is_physical_player());
        assert!(!DeviceId::new(33).is_physical_player());
    }

    #[test]
    fn only_removable_media_supports_archives() {
        assert!(SlotKind::Sd.supports_archives());
        assert!(SlotKind::Usb.supports_archives());
        assert!(!SlotKind::Cd.supports_archives());
        assert!(!SlotKind::Collection.supports_archives());
        assert!(!SlotKind::NoTrack.supports_archives());
    }

    #[test]
    fn track_ref_slot_ref_round_trip() {
        let track = TrackRef::new(DeviceId::new(3), SlotKind::Usb, 42);
        assert_eq!(
            track.slot_ref(),
            SlotRef::new(DeviceId::new(3), SlotKind::Usb)
        );
    }

    #[test]
    fn main_deck_is_hot_cue_zero() {
        let deck = DeckRef::main(DeviceId::new(2));
        assert!(deck.is_main());
        assert!(!DeckRef::hot_cue(DeviceId::new(2), 3).is_main());
    }
}
