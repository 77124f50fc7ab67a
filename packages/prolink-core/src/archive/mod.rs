//! On-disk metadata archives.
//!
//! An archive is a ZIP container (DEFLATE) holding the raw database
//! responses for every track on a piece of media, so that metadata can be
//! served without touching the player network. All entries live under the
//! `BLTMetaCache/` prefix with names derived from rekordbox ids; the
//! `version` entry carries the format tag and is always written first.
//!
//! Readers tolerate missing optional entries; a missing or mismatched
//! format tag rejects the whole file.

pub mod builder;
pub mod reader;

use std::path::PathBuf;

use thiserror::Error;

pub use builder::{build_archive, ArchiveProgressListener, BuildOutcome};
pub use reader::MetadataArchive;

/// Prefix shared by every entry in an archive.
pub const ENTRY_PREFIX: &str = "BLTMetaCache/";

/// The format tag stored in the version entry.
///
/// This exact string is what attach validates; it names the on-disk format,
/// which predates this library and must not change.
pub const FORMAT_TAG: &str = "BeatLink Metadata Cache version 1";

/// Name of the entry holding the format tag.
pub const VERSION_ENTRY: &str = "BLTMetaCache/version";

/// Entry holding the menu item stream for a track's metadata.
#[must_use]
pub fn metadata_entry(rekordbox_id: u32) -> String {
    format!("{ENTRY_PREFIX}metadata/{rekordbox_id}")
}

/// Entry holding a raw album art image.
#[must_use]
pub fn artwork_entry(artwork_id: u32) -> String {
    format!("{ENTRY_PREFIX}artwork/{artwork_id}.jpg")
}

/// Entry holding a track's beat grid payload.
#[must_use]
pub fn beat_grid_entry(rekordbox_id: u32) -> String {
    format!("{ENTRY_PREFIX}beatGrid/{rekordbox_id}")
}

/// Entry holding a track's raw cue list response message.
#[must_use]
pub fn cue_list_entry(rekordbox_id: u32) -> String {
    format!("{ENTRY_PREFIX}cueList/{rekordbox_id}")
}

/// Entry holding a track's raw waveform preview response message.
#[must_use]
pub fn wave_preview_entry(rekordbox_id: u32) -> String {
    format!("{ENTRY_PREFIX}wavePrev/{rekordbox_id}")
}

/// Entry holding a track's raw waveform detail response message.
#[must_use]
pub fn wave_detail_entry(rekordbox_id: u32) -> String {
    format!("{ENTRY_PREFIX}waveform/{rekordbox_id}")
}

/// Errors opening, reading, or writing archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem access failed.
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The ZIP container itself could not be read or written.
    #[error("archive container error: {0}")]
    Container(#[from] zip::result::ZipError),

    /// The file is not a metadata archive, or was written by a format
    /// version we do not understand.
    #[error("{path} does not hold a supported metadata archive (found tag {found:?})")]
    BadFormat {
        /// The file that failed validation.
        path: PathBuf,
        /// The tag that was found, if any.
        found: Option<String>,
    },

    /// A track listing handed to the builder contained a row that is not a
    /// track entry.
    #[error("track listing contained an unexpected item type {found:#06x}")]
    UnexpectedItem {
        /// The menu item type that was encountered.
        found: u16,
    },
}

/// Convenient Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
