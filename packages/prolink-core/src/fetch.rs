//! Single-track queries against a borrowed database session.
//!
//! Each function issues the request/response pairs for one piece of track
//! data and parses the result into the model types. Callers supply the
//! session; nothing here touches the pool or the cache.
//!
//! Unexpected response kinds are logged and treated as absent data rather
//! than errors, so a single odd track cannot abort an archive build.

use crate::model::{AlbumArt, BeatGrid, CueList, TrackMetadata, WaveformDetail, WaveformPreview};
use crate::protocol::constants::{
    kind, MENU_AVAILABLE_COUNT_ARG, NO_MENU_RESULTS_AVAILABLE, PAYLOAD_ARG,
};
use crate::protocol::{slot_arg, Client, ClientResult, Field, Message};
use crate::refs::{SlotRef, TrackRef};

/// Fetches the full metadata of one track, including its cue list.
///
/// Returns `None` when the server reports no results for the track, which
/// happens when the id does not exist on the media.
///
/// # Errors
///
/// Propagates connection and codec failures from the session.
pub async fn query_metadata(
    client: &mut dyn Client,
    track: TrackRef,
) -> ClientResult<Option<TrackMetadata>> {
    let slot = track.slot_ref();
    let request = Message::request(
        kind::METADATA_REQ,
        vec![slot_arg(slot), Field::U32(track.rekordbox_id)],
    );
    let Some(count) = menu_item_count(client.exchange(request).await?) else {
        return Ok(None);
    };
    if count == 0 {
        return Ok(None);
    }

    let rendered = client.render_menu(slot, count).await?;
    let items: Vec<Message> = rendered
        .into_iter()
        .filter(|m| m.kind == kind::MENU_ITEM)
        .collect();
    if items.is_empty() {
        log::warn!("[MetadataFetcher] Rendered metadata menu for {track} held no items");
        return Ok(None);
    }

    let cue_list = query_cue_list(client, slot, track.rekordbox_id).await?;
    Ok(Some(TrackMetadata::from_items(track, items, cue_list)))
}

/// Fetches the memory and hot cue points of a track.
///
/// Some tracks are answered with a non-cue-list response; that case is
/// logged and reported as absent.
pub async fn query_cue_list(
    client: &mut dyn Client,
    slot: SlotRef,
    rekordbox_id: u32,
) -> ClientResult<Option<CueList>> {
    let request = Message::request(
        kind::CUE_LIST_REQ,
        vec![slot_arg(slot), Field::U32(rekordbox_id)],
    );
    let response = client.exchange(request).await?;
    if response.kind != kind::CUE_LIST {
        log::warn!(
            "[MetadataFetcher] Cue list request for track {rekordbox_id} answered with kind {:#06x}; treating as absent",
            response.kind
        );
        return Ok(None);
    }
    match CueList::from_message(response) {
        Ok(cues) => Ok(Some(cues)),
        Err(e) => {
            log::warn!("[MetadataFetcher] Could not parse cue list for track {rekordbox_id}: {e}");
            Ok(None)
        }
    }
}

/// Fetches the full track listing of a slot, sorted by the default order.
///
/// Returns the rendered menu item messages; an empty media reports an empty
/// list, not an error.
pub async fn query_full_track_list(
    client: &mut dyn Client,
    slot: SlotRef,
) -> ClientResult<Vec<Message>> {
    let request = Message::request(kind::TRACK_LIST_REQ, vec![slot_arg(slot), Field::U32(0)]);
    query_menu(client, slot, request).await
}

/// Fetches the entries of a playlist, or of a playlist folder when
/// `is_folder` is set.
pub async fn query_playlist(
    client: &mut dyn Client,
    slot: SlotRef,
    sort_order: u32,
    playlist_id: u32,
    is_folder: bool,
) -> ClientResult<Vec<Message>> {
    let request = Message::request(
        kind::PLAYLIST_REQ,
        vec![
            slot_arg(slot),
            Field::U32(sort_order),
            Field::U32(playlist_id),
            Field::U32(u32::from(is_folder)),
        ],
    );
    query_menu(client, slot, request).await
}

/// Fetches the beat grid of a track.
pub async fn query_beat_grid(
    client: &mut dyn Client,
    track: TrackRef,
) -> ClientResult<Option<BeatGrid>> {
    let message = blob_query(client, kind::BEAT_GRID_REQ, track).await?;
    if expect_kind(&message, kind::BEAT_GRID, "beat grid", track).is_none() {
        return Ok(None);
    }
    let Some(payload) = message.arg_blob(PAYLOAD_ARG).cloned() else {
        return Ok(None);
    };
    Ok(Some(BeatGrid {
        track,
        raw: Some(message),
        payload,
    }))
}

/// Fetches the waveform preview of a track.
pub async fn query_waveform_preview(
    client: &mut dyn Client,
    track: TrackRef,
) -> ClientResult<Option<WaveformPreview>> {
    let message = blob_query(client, kind::WAVE_PREVIEW_REQ, track).await?;
    if expect_kind(&message, kind::WAVE_PREVIEW, "waveform preview", track).is_none() {
        return Ok(None);
    }
    let Some(payload) = message.arg_blob(PAYLOAD_ARG).cloned() else {
        return Ok(None);
    };
    Ok(Some(WaveformPreview {
        track,
        raw: message,
        payload,
    }))
}

/// Fetches the full-resolution waveform detail of a track.
pub async fn query_waveform_detail(
    client: &mut dyn Client,
    track: TrackRef,
) -> ClientResult<Option<WaveformDetail>> {
    let message = blob_query(client, kind::WAVE_DETAIL_REQ, track).await?;
    if expect_kind(&message, kind::WAVE_DETAIL, "waveform detail", track).is_none() {
        return Ok(None);
    }
    let Some(payload) = message.arg_blob(PAYLOAD_ARG).cloned() else {
        return Ok(None);
    };
    Ok(Some(WaveformDetail {
        track,
        raw: message,
        payload,
    }))
}

/// Fetches an album art image by artwork id.
pub async fn query_artwork(
    client: &mut dyn Client,
    slot: SlotRef,
    artwork_id: u32,
) -> ClientResult<Option<AlbumArt>> {
    let request = Message::request(
        kind::ARTWORK_REQ,
        vec![slot_arg(slot), Field::U32(artwork_id)],
    );
    let response = client.exchange(request).await?;
    if response.kind != kind::ARTWORK {
        log::warn!(
            "[MetadataFetcher] Artwork request for id {artwork_id} answered with kind {:#06x}; treating as absent",
            response.kind
        );
        return Ok(None);
    }
    Ok(response.arg_blob(PAYLOAD_ARG).map(|image| AlbumArt {
        artwork_id,
        image: image.clone(),
    }))
}

/// Runs one menu request to completion: availability, then render.
///
/// A `NO_MENU_RESULTS_AVAILABLE` count is an empty list, not a failure.
async fn query_menu(
    client: &mut dyn Client,
    slot: SlotRef,
    request: Message,
) -> ClientResult<Vec<Message>> {
    let Some(count) = menu_item_count(client.exchange(request).await?) else {
        return Ok(Vec::new());
    };
    if count == 0 {
        return Ok(Vec::new());
    }
    let rendered = client.render_menu(slot, count).await?;
    Ok(rendered
        .into_iter()
        .filter(|m| m.kind == kind::MENU_ITEM)
        .collect())
}

/// Interprets a menu availability response, mapping the no-results sentinel
/// and unexpected response kinds to `None`.
fn menu_item_count(response: Message) -> Option<u32> {
    if response.kind != kind::MENU_AVAILABLE {
        log::warn!(
            "[MetadataFetcher] Menu request answered with kind {:#06x}; treating as no results",
            response.kind
        );
        return None;
    }
    match response.arg_number(MENU_AVAILABLE_COUNT_ARG) {
        None | Some(NO_MENU_RESULTS_AVAILABLE) => None,
        Some(count) => Some(count),
    }
}

async fn blob_query(
    client: &mut dyn Client,
    request_kind: u16,
    track: TrackRef,
) -> ClientResult<Message> {
    let request = Message::request(
        request_kind,
        vec![slot_arg(track.slot_ref()), Field::U32(track.rekordbox_id)],
    );
    client.exchange(request).await
}

fn expect_kind(message: &Message, expected: u16, what: &str, track: TrackRef) -> Option<()> {
    if message.kind == expected {
        Some(())
    } else {
        log::warn!(
            "[MetadataFetcher] {what} request for {track} answered with kind {:#06x}; treating as absent",
            message.kind
        );
        None
    }
}
