//! Reading attached metadata archives.
//!
//! An open archive serves the same lookups the fetcher performs against a
//! live player, from raw responses captured at build time. Per the archive
//! contract, a missing entry is absent data and a corrupt entry is logged
//! and treated as absent; only a bad format tag rejects the file.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{
    artwork_entry, beat_grid_entry, cue_list_entry, metadata_entry, wave_detail_entry,
    wave_preview_entry, ArchiveError, ArchiveResult, FORMAT_TAG, VERSION_ENTRY,
};
use crate::model::{AlbumArt, BeatGrid, CueList, TrackMetadata, WaveformDetail, WaveformPreview};
use crate::protocol::constants::PAYLOAD_ARG;
use crate::protocol::{read_items_until_footer, Message};
use crate::refs::TrackRef;

/// An open, validated metadata archive.
///
/// The underlying container handle is closed when the value is dropped,
/// which is how the registry guarantees exactly-one close on replacement.
pub struct MetadataArchive {
    path: PathBuf,
    zip: Mutex<ZipArchive<File>>,
}

impl MetadataArchive {
    /// Opens an archive file and validates its format tag.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::BadFormat`] if the version entry is absent or holds
    /// a different tag; I/O and container errors pass through.
    pub fn open(path: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let mut zip = ZipArchive::new(file)?;

        let found = match zip.by_name(VERSION_ENTRY) {
            Ok(mut entry) => {
                let mut tag = String::new();
                entry.read_to_string(&mut tag)?;
                Some(tag)
            }
            Err(ZipError::FileNotFound) => None,
            Err(e) => return Err(e.into()),
        };
        match found {
            Some(ref tag) if tag == FORMAT_TAG => {}
            found => return Err(ArchiveError::BadFormat { path, found }),
        }

        Ok(Self {
            path,
            zip: Mutex::new(zip),
        })
    }

    /// The file the archive was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a track's metadata, including its cue list entry when present.
    #[must_use]
    pub fn read_metadata(&self, track: TrackRef) -> Option<TrackMetadata> {
        let bytes = self.entry_bytes(&metadata_entry(track.rekordbox_id))?;
        let mut cursor = bytes;
        let items = match read_items_until_footer(&mut cursor) {
            Ok(items) => items,
            Err(e) => {
                log::warn!(
                    "[MetadataArchive] Corrupt metadata entry for {track} in {}: {e}",
                    self.path.display()
                );
                return None;
            }
        };
        let cue_list = self.read_cue_list(track.rekordbox_id);
        Some(TrackMetadata::from_items(track, items, cue_list))
    }

    /// Reads a track's cue list.
    #[must_use]
    pub fn read_cue_list(&self, rekordbox_id: u32) -> Option<CueList> {
        let message = self.entry_message(&cue_list_entry(rekordbox_id))?;
        match CueList::from_message(message) {
            Ok(cues) => Some(cues),
            Err(e) => {
                log::warn!(
                    "[MetadataArchive] Corrupt cue list entry for track {rekordbox_id} in {}: {e}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Reads a track's beat grid.
    #[must_use]
    pub fn read_beat_grid(&self, track: TrackRef) -> Option<BeatGrid> {
        let payload = self.entry_bytes(&beat_grid_entry(track.rekordbox_id))?;
        Some(BeatGrid {
            track,
            raw: None,
            payload,
        })
    }

    /// Reads a track's waveform preview.
    #[must_use]
    pub fn read_waveform_preview(&self, track: TrackRef) -> Option<WaveformPreview> {
        let raw = self.entry_message(&wave_preview_entry(track.rekordbox_id))?;
        let payload = raw.arg_blob(PAYLOAD_ARG)?.clone();
        Some(WaveformPreview {
            track,
            raw,
            payload,
        })
    }

    /// Reads a track's waveform detail.
    #[must_use]
    pub fn read_waveform_detail(&self, track: TrackRef) -> Option<WaveformDetail> {
        let raw = self.entry_message(&wave_detail_entry(track.rekordbox_id))?;
        let payload = raw.arg_blob(PAYLOAD_ARG)?.clone();
        Some(WaveformDetail {
            track,
            raw,
            payload,
        })
    }

    /// Reads an album art image by artwork id.
    #[must_use]
    pub fn read_artwork(&self, artwork_id: u32) -> Option<AlbumArt> {
        let image = self.entry_bytes(&artwork_entry(artwork_id))?;
        Some(AlbumArt { artwork_id, image })
    }

    /// Reads one entry fully, mapping "not found" to `None` and logging any
    /// other failure.
    fn entry_bytes(&self, name: &str) -> Option<Bytes> {
        let mut zip = self.zip.lock();
        let result = match zip.by_name(name) {
            Ok(mut entry) => {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                match entry.read_to_end(&mut buf) {
                    Ok(_) => Some(Bytes::from(buf)),
                    Err(e) => {
                        log::warn!(
                            "[MetadataArchive] Could not read entry {name} from {}: {e}",
                            self.path.display()
                        );
                        None
                    }
                }
            }
            Err(ZipError::FileNotFound) => None,
            Err(e) => {
                log::warn!(
                    "[MetadataArchive] Could not open entry {name} in {}: {e}",
                    self.path.display()
                );
                None
            }
        };
        result
    }

    /// Reads one entry holding a single serialized message.
    fn entry_message(&self, name: &str) -> Option<Message> {
        let bytes = self.entry_bytes(name)?;
        let mut cursor = bytes;
        match Message::read_from(&mut cursor) {
            Ok(message) => Some(message),
            Err(e) => {
                log::warn!(
                    "[MetadataArchive] Corrupt entry {name} in {}: {e}",
                    self.path.display()
                );
                None
            }
        }
    }
}

impl fmt::Debug for MetadataArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataArchive")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn open_rejects_missing_version_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.zip");
        write_zip(&path, &[("unrelated", b"data")]);

        let err = MetadataArchive::open(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::BadFormat { found: None, .. }));
    }

    #[test]
    fn open_rejects_mismatched_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.zip");
        write_zip(
            &path,
            &[(VERSION_ENTRY, b"BeatLink Metadata Cache version 9" as &[u8])],
        );

        let err = MetadataArchive::open(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::BadFormat { found: Some(_), .. }));
    }

    #[test]
    fn open_accepts_the_format_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("good.zip");
        write_zip(&path, &[(VERSION_ENTRY, FORMAT_TAG.as_bytes())]);

        let archive = MetadataArchive::open(&path).unwrap();
        assert_eq!(archive.path(), path);
    }

    #[test]
    fn missing_entries_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.zip");
        write_zip(&path, &[(VERSION_ENTRY, FORMAT_TAG.as_bytes())]);

        let archive = MetadataArchive::open(&path).unwrap();
        let track = TrackRef::new(crate::refs::DeviceId::new(1), crate::refs::SlotKind::Usb, 7);
        assert!(archive.read_metadata(track).is_none());
        assert!(archive.read_cue_list(7).is_none());
        assert!(archive.read_beat_grid(track).is_none());
        assert!(archive.read_artwork(7).is_none());
    }

    #[test]
    fn corrupt_metadata_entry_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.zip");
        write_zip(
            &path,
            &[
                (VERSION_ENTRY, FORMAT_TAG.as_bytes()),
                (&metadata_entry(7), b"this is not a message stream"),
            ],
        );

        let archive = MetadataArchive::open(&path).unwrap();
        let track = TrackRef::new(crate::refs::DeviceId::new(1), crate::refs::SlotKind::Usb, 7);
        assert!(archive.read_metadata(track).is_none());
    }
}
