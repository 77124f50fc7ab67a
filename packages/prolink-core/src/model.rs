//! Parsed metadata values built from raw protocol responses.
//!
//! Every type here keeps a verbatim copy of the wire-level response it was
//! built from: the parsed fields are conveniences, the raw bytes are the
//! authoritative form and are what archives persist.

use bytes::{Buf, Bytes};

use crate::protocol::constants::{
    item_arg, item_type, kind, CUE_ENTRY_SIZE, CUE_LIST_COUNT_ARG, PAYLOAD_ARG,
};
use crate::protocol::{Message, ProtocolError, ProtocolResult};
use crate::refs::TrackRef;

/// One cue point of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueEntry {
    /// Position of the cue within the track, in milliseconds.
    pub cue_time_ms: u32,
    /// The hot cue button the entry is assigned to; 0 for a memory cue.
    pub hot_cue_number: u8,
}

/// The memory and hot cue points of a track.
///
/// Backed by the raw cue list response so it can be written into an archive
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueList {
    raw: Option<Message>,
    entries: Vec<CueEntry>,
}

impl CueList {
    /// Parses a cue list response message.
    ///
    /// The payload blob carries one fixed-size record per entry: the cue
    /// time as a 4-byte number, the hot cue number, and three reserved
    /// bytes.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Corrupt`] if the message does not have the cue list
    /// shape or the payload does not match the announced entry count.
    pub fn from_message(message: Message) -> ProtocolResult<Self> {
        if message.kind != kind::CUE_LIST {
            return Err(ProtocolError::Corrupt(format!(
                "expected cue list response, found kind {:#06x}",
                message.kind
            )));
        }
        let count = message
            .arg_number(CUE_LIST_COUNT_ARG)
            .ok_or_else(|| ProtocolError::Corrupt("cue list is missing its entry count".into()))?
            as usize;
        let payload = message
            .arg_blob(PAYLOAD_ARG)
            .ok_or_else(|| ProtocolError::Corrupt("cue list is missing its payload".into()))?;
        if payload.len() < count * CUE_ENTRY_SIZE {
            return Err(ProtocolError::Corrupt(format!(
                "cue list payload holds {} bytes for {count} entries",
                payload.len()
            )));
        }

        let mut entries = Vec::with_capacity(count);
        let mut cursor = payload.clone();
        for _ in 0..count {
            let cue_time_ms = cursor.get_u32();
            let hot_cue_number = cursor.get_u8();
            cursor.advance(3);
            entries.push(CueEntry {
                cue_time_ms,
                hot_cue_number,
            });
        }

        Ok(Self {
            raw: Some(message),
            entries,
        })
    }

    /// The entries, in the order the player serialized them.
    #[must_use]
    pub fn entries(&self) -> &[CueEntry] {
        &self.entries
    }

    /// The raw response message, if this list came off the wire or out of
    /// an archive (as opposed to being absent).
    #[must_use]
    pub fn raw(&self) -> Option<&Message> {
        self.raw.as_ref()
    }
}

/// Rich metadata for one track.
///
/// `raw_items` is exactly the sequence of menu item messages the server
/// returned, in order; the named fields are derived from it and are never
/// authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    track: TrackRef,
    raw_items: Vec<Message>,
    title: String,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    comment: Option<String>,
    duration_seconds: u32,
    tempo_centi_bpm: u32,
    artwork_id: u32,
    cue_list: Option<CueList>,
}

impl TrackMetadata {
    /// Builds metadata from the rendered menu items of a metadata request.
    ///
    /// Unrecognized item types are kept in `raw_items` but contribute no
    /// parsed field.
    #[must_use]
    pub fn from_items(track: TrackRef, items: Vec<Message>, cue_list: Option<CueList>) -> Self {
        let mut metadata = Self {
            track,
            raw_items: Vec::new(),
            title: String::new(),
            artist: None,
            album: None,
            genre: None,
            comment: None,
            duration_seconds: 0,
            tempo_centi_bpm: 0,
            artwork_id: 0,
            cue_list,
        };

        for item in &items {
            if item.kind != kind::MENU_ITEM {
                continue;
            }
            let label = item.arg_text(item_arg::LABEL).unwrap_or_default();
            match item.arg_number(item_arg::ITEM_TYPE).map(|t| t as u16) {
                Some(item_type::TITLE) => {
                    metadata.title = label.to_owned();
                    metadata.artwork_id = item.arg_number(item_arg::ARTWORK_ID).unwrap_or(0);
                }
                Some(item_type::ARTIST) => metadata.artist = Some(label.to_owned()),
                Some(item_type::ALBUM) => metadata.album = Some(label.to_owned()),
                Some(item_type::GENRE) => metadata.genre = Some(label.to_owned()),
                Some(item_type::COMMENT) => metadata.comment = Some(label.to_owned()),
                Some(item_type::DURATION) => {
                    metadata.duration_seconds = item.arg_number(item_arg::NUMERIC_2).unwrap_or(0);
                }
                Some(item_type::TEMPO) => {
                    metadata.tempo_centi_bpm = item.arg_number(item_arg::NUMERIC_2).unwrap_or(0);
                }
                _ => {}
            }
        }

        metadata.raw_items = items;
        metadata
    }

    /// The track this metadata describes.
    #[must_use]
    pub fn track(&self) -> TrackRef {
        self.track
    }

    /// The raw menu item messages, verbatim and in server order.
    #[must_use]
    pub fn raw_items(&self) -> &[Message] {
        &self.raw_items
    }

    /// The track title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The performing artist, if the library records one.
    #[must_use]
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    /// The album title, if the library records one.
    #[must_use]
    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    /// The genre, if the library records one.
    #[must_use]
    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    /// The comment, if the library records one.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Playback length in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Tempo in hundredths of a beat per minute.
    #[must_use]
    pub fn tempo_centi_bpm(&self) -> u32 {
        self.tempo_centi_bpm
    }

    /// The id of the album art, 0 when the track has none.
    #[must_use]
    pub fn artwork_id(&self) -> u32 {
        self.artwork_id
    }

    /// The track's cue list, when one was fetched.
    #[must_use]
    pub fn cue_list(&self) -> Option<&CueList> {
        self.cue_list.as_ref()
    }
}

/// A track's beat grid: the time and bar position of every beat.
///
/// The payload is kept opaque; rendering code downstream knows its layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatGrid {
    /// The track the grid belongs to.
    pub track: TrackRef,
    /// The raw response message, when the grid came off the wire.
    pub raw: Option<Message>,
    /// The grid payload bytes.
    pub payload: Bytes,
}

/// The small waveform image shown in a player's track display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformPreview {
    /// The track the preview belongs to.
    pub track: TrackRef,
    /// The raw response message.
    pub raw: Message,
    /// The preview payload bytes.
    pub payload: Bytes,
}

/// The full-resolution scrolling waveform of a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformDetail {
    /// The track the waveform belongs to.
    pub track: TrackRef,
    /// The raw response message.
    pub raw: Message,
    /// The waveform payload bytes.
    pub payload: Bytes,
}

/// An album art image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumArt {
    /// The artwork id the image was requested by.
    pub artwork_id: u32,
    /// The raw JPEG bytes.
    pub image: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Field;
    use crate::refs::{DeviceId, SlotKind};
    use bytes::{BufMut, BytesMut};

    fn track() -> TrackRef {
        TrackRef::new(DeviceId::new(2), SlotKind::Usb, 42)
    }

    fn item(item_type: u16, numeric_2: u32, label: &str, artwork: u32) -> Message {
        Message::response(
            1,
            kind::MENU_ITEM,
            vec![
                Field::U32(0),
                Field::U32(numeric_2),
                Field::Text(label.into()),
                Field::Text(String::new()),
                Field::U16(item_type),
                Field::U32(0),
                Field::U32(artwork),
            ],
        )
    }

    fn cue_list_message(entries: &[(u32, u8)]) -> Message {
        let mut payload = BytesMut::new();
        for (time, hot_cue) in entries {
            payload.put_u32(*time);
            payload.put_u8(*hot_cue);
            payload.put_slice(&[0, 0, 0]);
        }
        Message::response(
            1,
            kind::CUE_LIST,
            vec![
                Field::U32(entries.len() as u32),
                Field::Blob(payload.freeze()),
            ],
        )
    }

    #[test]
    fn metadata_derives_conveniences_from_items() {
        let items = vec![
            item(item_type::TITLE, 0, "Demo Track", 17),
            item(item_type::ARTIST, 0, "Loopmasters", 0),
            item(item_type::DURATION, 247, "", 0),
            item(item_type::TEMPO, 12800, "", 0),
        ];
        let metadata = TrackMetadata::from_items(track(), items.clone(), None);

        assert_eq!(metadata.title(), "Demo Track");
        assert_eq!(metadata.artist(), Some("Loopmasters"));
        assert_eq!(metadata.duration_seconds(), 247);
        assert_eq!(metadata.tempo_centi_bpm(), 12800);
        assert_eq!(metadata.artwork_id(), 17);
        assert_eq!(metadata.raw_items(), items.as_slice());
    }

    #[test]
    fn unknown_item_types_are_kept_raw_but_unparsed() {
        let items = vec![
            item(item_type::TITLE, 0, "Demo Track", 0),
            item(0x77, 9, "mystery", 0),
        ];
        let metadata = TrackMetadata::from_items(track(), items, None);
        assert_eq!(metadata.raw_items().len(), 2);
        assert_eq!(metadata.title(), "Demo Track");
    }

    #[test]
    fn cue_list_parses_entries_in_order() {
        let message = cue_list_message(&[(1_000, 0), (32_500, 2)]);
        let cues = CueList::from_message(message.clone()).unwrap();

        assert_eq!(
            cues.entries(),
            &[
                CueEntry {
                    cue_time_ms: 1_000,
                    hot_cue_number: 0
                },
                CueEntry {
                    cue_time_ms: 32_500,
                    hot_cue_number: 2
                },
            ]
        );
        assert_eq!(cues.raw(), Some(&message));
    }

    #[test]
    fn cue_list_rejects_wrong_kind() {
        let message = Message::response(1, kind::BEAT_GRID, vec![]);
        assert!(CueList::from_message(message).is_err());
    }

    #[test]
    fn cue_list_rejects_short_payload() {
        let mut message = cue_list_message(&[(1_000, 0)]);
        message.args[0] = Field::U32(5);
        assert!(CueList::from_message(message).is_err());
    }
}
