//! Fixed remote database protocol constants that should NOT be changed.
//!
//! These values are defined by the player firmware's database server and
//! changing them would break interoperability with real devices, and with
//! archives written by earlier versions of this library.

// ─────────────────────────────────────────────────────────────────────────────
// Message framing
// ─────────────────────────────────────────────────────────────────────────────

/// Magic number opening every message, sent as a 4-byte number field.
pub const MESSAGE_MAGIC: u32 = 0x8723_49ae;

/// Field tag for a 1-byte number.
pub const TAG_U8: u8 = 0x0f;

/// Field tag for a 2-byte number.
pub const TAG_U16: u8 = 0x10;

/// Field tag for a 4-byte number.
pub const TAG_U32: u8 = 0x11;

/// Field tag for a length-prefixed binary blob.
pub const TAG_BLOB: u8 = 0x14;

/// Field tag for a length-prefixed UTF-16BE string.
pub const TAG_TEXT: u8 = 0x26;

/// Length of the argument-type blob that precedes a message's arguments.
///
/// Always 12 bytes; unused positions are zero.
pub const ARG_TYPE_TAGS_LEN: usize = 12;

// ─────────────────────────────────────────────────────────────────────────────
// Message kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Known message kind values (the 2-byte number field after the transaction).
pub mod kind {
    /// Request the full track listing of a slot.
    pub const TRACK_LIST_REQ: u16 = 0x1004;
    /// Request the entries of a playlist or playlist folder.
    pub const PLAYLIST_REQ: u16 = 0x1105;
    /// Request the metadata menu for a single track.
    pub const METADATA_REQ: u16 = 0x2002;
    /// Request an album art image.
    pub const ARTWORK_REQ: u16 = 0x2003;
    /// Request the waveform preview of a track.
    pub const WAVE_PREVIEW_REQ: u16 = 0x2004;
    /// Request the memory and hot cue points of a track.
    pub const CUE_LIST_REQ: u16 = 0x2104;
    /// Request the beat grid of a track.
    pub const BEAT_GRID_REQ: u16 = 0x2204;
    /// Request the full-resolution waveform detail of a track.
    pub const WAVE_DETAIL_REQ: u16 = 0x2904;

    /// Response announcing how many menu items a menu request produced.
    pub const MENU_AVAILABLE: u16 = 0x4000;
    /// First message of a rendered menu.
    pub const MENU_HEADER: u16 = 0x4001;
    /// Response carrying an album art image.
    pub const ARTWORK: u16 = 0x4002;
    /// One rendered menu item.
    pub const MENU_ITEM: u16 = 0x4101;
    /// Zero-argument footer terminating a rendered menu.
    ///
    /// Also used as the sentinel terminating item streams in archives.
    pub const MENU_FOOTER: u16 = 0x4201;
    /// Response carrying a waveform preview.
    pub const WAVE_PREVIEW: u16 = 0x4402;
    /// Response carrying a beat grid.
    pub const BEAT_GRID: u16 = 0x4602;
    /// Response carrying a cue list.
    pub const CUE_LIST: u16 = 0x4702;
    /// Response carrying waveform detail.
    pub const WAVE_DETAIL: u16 = 0x4a02;
}

/// Item count reported by [`kind::MENU_AVAILABLE`] when a menu request
/// matched nothing. Means "empty list", not an error.
pub const NO_MENU_RESULTS_AVAILABLE: u32 = 0xffff_fffa;

// ─────────────────────────────────────────────────────────────────────────────
// Menu item layout
// ─────────────────────────────────────────────────────────────────────────────

/// Argument positions within a [`kind::MENU_ITEM`] message.
///
/// Items carry seven arguments: two 4-byte numbers, two strings, the item
/// type, a flags word, and the artwork id.
pub mod item_arg {
    /// First numeric argument (parent id or row-specific value).
    pub const NUMERIC_1: usize = 0;
    /// Second numeric argument (rekordbox id, duration, bpm, depending on type).
    pub const NUMERIC_2: usize = 1;
    /// Primary label.
    pub const LABEL: usize = 2;
    /// Secondary label.
    pub const LABEL_2: usize = 3;
    /// The item type (see [`super::item_type`]).
    pub const ITEM_TYPE: usize = 4;
    /// Flags word.
    pub const FLAGS: usize = 5;
    /// Artwork id, 0 when the row carries no art.
    pub const ARTWORK_ID: usize = 6;
}

/// Known menu item types.
///
/// Track listing rows are [`item_type::TITLE`] rows whose second numeric
/// argument is the track's rekordbox id.
pub mod item_type {
    pub const GENRE: u16 = 0x0001;
    pub const ARTIST: u16 = 0x0002;
    pub const ALBUM: u16 = 0x0003;
    pub const TITLE: u16 = 0x0004;
    pub const RATING: u16 = 0x000a;
    pub const DURATION: u16 = 0x000b;
    pub const KEY: u16 = 0x000c;
    pub const TEMPO: u16 = 0x000d;
    pub const COMMENT: u16 = 0x0023;
}

// ─────────────────────────────────────────────────────────────────────────────
// Response payload layout
// ─────────────────────────────────────────────────────────────────────────────

/// Argument position of the item count in a [`kind::MENU_AVAILABLE`] response.
pub const MENU_AVAILABLE_COUNT_ARG: usize = 1;

/// Argument position of the binary payload in blob-carrying responses
/// (artwork, beat grid, waveforms, cue list entries).
pub const PAYLOAD_ARG: usize = 1;

/// Argument position of the entry count in a [`kind::CUE_LIST`] response.
pub const CUE_LIST_COUNT_ARG: usize = 0;

/// Size in bytes of one serialized cue entry in a cue list payload.
pub const CUE_ENTRY_SIZE: usize = 8;
