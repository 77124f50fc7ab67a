//! Building metadata archives from a live player.
//!
//! The builder walks a slot's track listing (or one playlist), fetches each
//! track's raw responses over the borrowed session, and streams them into
//! the ZIP container in the fixed per-track entry order a streaming reader
//! expects. Progress is reported after every track; the listener returning
//! false cancels the build and removes the partial output.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use bytes::BytesMut;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{
    artwork_entry, beat_grid_entry, cue_list_entry, metadata_entry, wave_detail_entry,
    wave_preview_entry, ArchiveError, FORMAT_TAG, VERSION_ENTRY,
};
use crate::error::FinderResult;
use crate::fetch;
use crate::model::TrackMetadata;
use crate::protocol::constants::{item_arg, item_type};
use crate::protocol::{Client, Message};
use crate::refs::{SlotRef, TrackRef};

/// Receives progress reports during an archive build.
///
/// Called once per listing entry, after that track's entries are written.
/// Listeners run on the building task and must be fast.
pub trait ArchiveProgressListener: Send + Sync {
    /// Reports one completed listing entry.
    ///
    /// `current` is the metadata of the track just processed, when the
    /// player had any. Return false to cancel the build.
    fn progress(
        &self,
        current: Option<&TrackMetadata>,
        completed: usize,
        total: usize,
    ) -> bool;
}

/// How a build finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Every listing entry was written.
    Completed {
        /// Number of listing entries processed.
        tracks: usize,
    },
    /// The progress listener requested cancellation; the partial output was
    /// removed.
    Cancelled,
}

/// Builds an archive of every track in a slot, or of one playlist when
/// `playlist_id` is non-zero.
///
/// Any existing file at `path` is replaced. On cancellation or failure the
/// partial output is deleted; the container is closed on every exit path.
///
/// # Errors
///
/// Session and codec failures abort the build, as does a listing row that
/// is not a track entry ([`ArchiveError::UnexpectedItem`]). Tracks the
/// player reports no data for are skipped, not errors.
pub async fn build_archive(
    client: &mut dyn Client,
    slot: SlotRef,
    playlist_id: u32,
    path: &Path,
    listener: Option<&dyn ArchiveProgressListener>,
) -> FinderResult<BuildOutcome> {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            log::warn!(
                "[ArchiveBuilder] Could not delete existing file {}: {e}",
                path.display()
            );
        }
    }

    let listing = if playlist_id == 0 {
        fetch::query_full_track_list(client, slot).await?
    } else {
        fetch::query_playlist(client, slot, 0, playlist_id, false).await?
    };
    log::info!(
        "[ArchiveBuilder] Building archive of {} tracks from {slot} into {}",
        listing.len(),
        path.display()
    );

    let file = fs::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    // The version entry goes first so readers can validate before anything
    // else is consumed.
    if let Err(e) = write_version_entry(&mut zip, options) {
        discard(zip, path);
        return Err(e.into());
    }

    match write_tracks(client, slot, &listing, &mut zip, options, listener).await {
        Ok(true) => {
            zip.finish().map_err(ArchiveError::from)?;
            log::info!(
                "[ArchiveBuilder] Finished archive of {} tracks at {}",
                listing.len(),
                path.display()
            );
            Ok(BuildOutcome::Completed {
                tracks: listing.len(),
            })
        }
        Ok(false) => {
            discard(zip, path);
            log::info!(
                "[ArchiveBuilder] Build of {} cancelled by listener; partial output removed",
                path.display()
            );
            Ok(BuildOutcome::Cancelled)
        }
        Err(e) => {
            discard(zip, path);
            Err(e)
        }
    }
}

/// Writes every track of the listing. Returns false when the listener
/// cancelled the build.
async fn write_tracks(
    client: &mut dyn Client,
    slot: SlotRef,
    listing: &[Message],
    zip: &mut ZipWriter<fs::File>,
    options: FileOptions,
    listener: Option<&dyn ArchiveProgressListener>,
) -> FinderResult<bool> {
    let total = listing.len();
    let mut artwork_written: HashSet<u32> = HashSet::new();

    for (index, row) in listing.iter().enumerate() {
        let row_type = row.arg_number(item_arg::ITEM_TYPE).unwrap_or(0) as u16;
        if row_type != item_type::TITLE {
            return Err(ArchiveError::UnexpectedItem { found: row_type }.into());
        }
        let rekordbox_id = row
            .arg_number(item_arg::NUMERIC_2)
            .ok_or(ArchiveError::UnexpectedItem { found: row_type })?;
        let track = TrackRef::new(slot.device, slot.slot, rekordbox_id);

        let metadata = fetch::query_metadata(client, track).await?;
        if let Some(metadata) = &metadata {
            write_metadata_entry(zip, options, metadata)?;

            let artwork_id = metadata.artwork_id();
            if artwork_id != 0 && artwork_written.insert(artwork_id) {
                if let Some(art) = fetch::query_artwork(client, slot, artwork_id).await? {
                    write_entry(zip, options, &artwork_entry(artwork_id), &art.image)?;
                }
            }

            if let Some(grid) = fetch::query_beat_grid(client, track).await? {
                write_entry(zip, options, &beat_grid_entry(rekordbox_id), &grid.payload)?;
            }

            // The cue list is fetched again here rather than re-emitted from
            // the metadata: the entry stores the response message verbatim,
            // and metadata entries do not embed cue lists.
            if let Some(cues) = fetch::query_cue_list(client, slot, rekordbox_id).await? {
                if let Some(raw) = cues.raw() {
                    write_entry(zip, options, &cue_list_entry(rekordbox_id), &raw.to_bytes())?;
                }
            }

            if let Some(preview) = fetch::query_waveform_preview(client, track).await? {
                write_entry(
                    zip,
                    options,
                    &wave_preview_entry(rekordbox_id),
                    &preview.raw.to_bytes(),
                )?;
            }

            if let Some(detail) = fetch::query_waveform_detail(client, track).await? {
                write_entry(
                    zip,
                    options,
                    &wave_detail_entry(rekordbox_id),
                    &detail.raw.to_bytes(),
                )?;
            }
        } else {
            log::warn!("[ArchiveBuilder] No metadata for {track}; skipping its entries");
        }

        if let Some(listener) = listener {
            if !listener.progress(metadata.as_ref(), index + 1, total) {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

fn write_version_entry(
    zip: &mut ZipWriter<fs::File>,
    options: FileOptions,
) -> Result<(), ArchiveError> {
    write_entry(zip, options, VERSION_ENTRY, FORMAT_TAG.as_bytes())
}

/// Writes a track's menu items followed by the footer sentinel.
fn write_metadata_entry(
    zip: &mut ZipWriter<fs::File>,
    options: FileOptions,
    metadata: &TrackMetadata,
) -> Result<(), ArchiveError> {
    let mut buf = BytesMut::new();
    for item in metadata.raw_items() {
        item.write_to(&mut buf);
    }
    Message::footer().write_to(&mut buf);
    write_entry(
        zip,
        options,
        &metadata_entry(metadata.track().rekordbox_id),
        &buf,
    )
}

fn write_entry(
    zip: &mut ZipWriter<fs::File>,
    options: FileOptions,
    name: &str,
    bytes: &[u8],
) -> Result<(), ArchiveError> {
    zip.start_file(name, options)?;
    zip.write_all(bytes)?;
    Ok(())
}

/// Closes the writer and removes the output file.
fn discard(mut zip: ZipWriter<fs::File>, path: &Path) {
    match zip.finish() {
        Ok(file) => drop(file),
        Err(e) => log::warn!("[ArchiveBuilder] Could not close discarded archive: {e}"),
    }
    if let Err(e) = fs::remove_file(path) {
        log::warn!(
            "[ArchiveBuilder] Could not remove partial archive {}: {e}",
            path.display()
        );
    }
}
