//! Simulated player database sessions for tests.
//!
//! [`SimulatedPool`] hands out [`SimulatedDevice`] sessions backed by a
//! shared in-memory [`SimLibrary`], and counts session borrows and request
//! round trips so tests can assert on traffic.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::constants::{item_type, kind, NO_MENU_RESULTS_AVAILABLE};
use crate::protocol::{Client, ClientError, ClientPool, ClientResult, Field, Message};
use crate::refs::{DeviceId, SlotRef};

/// One track in the simulated library.
#[derive(Debug, Clone)]
pub struct SimTrack {
    pub title: String,
    pub artist: String,
    pub duration_seconds: u32,
    pub artwork_id: u32,
    pub artwork: Vec<u8>,
    /// (cue_time_ms, hot_cue_number) pairs.
    pub cues: Vec<(u32, u8)>,
    pub beat_grid: Vec<u8>,
    pub wave_preview: Vec<u8>,
    pub wave_detail: Vec<u8>,
    /// When set, cue list requests are answered with a wrong-kind response.
    pub bad_cue_response: bool,
}

impl SimTrack {
    pub fn named(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            artist: "Loopmasters".to_owned(),
            duration_seconds: 247,
            artwork_id: 0,
            artwork: vec![0xff, 0xd8, 0xff, 0xe0],
            cues: vec![(1_000, 0)],
            beat_grid: vec![0x10; 16],
            wave_preview: vec![0x20; 24],
            wave_detail: vec![0x30; 48],
            bad_cue_response: false,
        }
    }
}

/// The in-memory media library a simulated device answers from.
#[derive(Debug, Default)]
pub struct SimLibrary {
    pub tracks: BTreeMap<u32, SimTrack>,
    pub playlists: HashMap<u32, Vec<u32>>,
}

impl SimLibrary {
    pub fn with_tracks(entries: Vec<(u32, SimTrack)>) -> Self {
        Self {
            tracks: entries.into_iter().collect(),
            playlists: HashMap::new(),
        }
    }

    fn listing_row(&self, id: u32, track: &SimTrack) -> Message {
        menu_item(id, &track.title, item_type::TITLE, track.artwork_id)
    }

    fn metadata_items(&self, id: u32) -> Option<Vec<Message>> {
        let track = self.tracks.get(&id)?;
        Some(vec![
            menu_item(id, &track.title, item_type::TITLE, track.artwork_id),
            menu_item(0, &track.artist, item_type::ARTIST, 0),
            menu_item(track.duration_seconds, "", item_type::DURATION, 0),
        ])
    }

    fn cue_response(&self, transaction: u32, id: u32) -> Message {
        match self.tracks.get(&id) {
            Some(track) if track.bad_cue_response => {
                Message::response(transaction, kind::BEAT_GRID, vec![])
            }
            Some(track) => {
                let mut payload = BytesMut::new();
                for (time, number) in &track.cues {
                    payload.put_u32(*time);
                    payload.put_u8(*number);
                    payload.put_slice(&[0, 0, 0]);
                }
                Message::response(
                    transaction,
                    kind::CUE_LIST,
                    vec![
                        Field::U32(track.cues.len() as u32),
                        Field::Blob(payload.freeze()),
                    ],
                )
            }
            None => Message::response(transaction, kind::MENU_FOOTER, vec![]),
        }
    }

    fn blob_response(&self, transaction: u32, request_kind: u16, id: u32) -> Message {
        let (response_kind, payload) = match (request_kind, self.tracks.get(&id)) {
            (kind::BEAT_GRID_REQ, Some(t)) => (kind::BEAT_GRID, t.beat_grid.clone()),
            (kind::WAVE_PREVIEW_REQ, Some(t)) => (kind::WAVE_PREVIEW, t.wave_preview.clone()),
            (kind::WAVE_DETAIL_REQ, Some(t)) => (kind::WAVE_DETAIL, t.wave_detail.clone()),
            _ => (kind::MENU_FOOTER, Vec::new()),
        };
        Message::response(
            transaction,
            response_kind,
            vec![Field::U32(id), Field::Blob(Bytes::from(payload))],
        )
    }

    fn artwork_response(&self, transaction: u32, artwork_id: u32) -> Message {
        let image = self
            .tracks
            .values()
            .find(|t| t.artwork_id == artwork_id)
            .map(|t| t.artwork.clone())
            .unwrap_or_default();
        Message::response(
            transaction,
            kind::ARTWORK,
            vec![Field::U32(artwork_id), Field::Blob(Bytes::from(image))],
        )
    }
}

/// Builds a menu item message with the standard seven-argument layout.
pub fn menu_item(numeric_2: u32, label: &str, item: u16, artwork_id: u32) -> Message {
    Message::response(
        0,
        kind::MENU_ITEM,
        vec![
            Field::U32(0),
            Field::U32(numeric_2),
            Field::Text(label.to_owned()),
            Field::Text(String::new()),
            Field::U16(item),
            Field::U32(0),
            Field::U32(artwork_id),
        ],
    )
}

/// One borrowed session against the simulated library.
pub struct SimulatedDevice {
    library: Arc<SimLibrary>,
    exchanges: Arc<AtomicUsize>,
    pending_menu: Vec<Message>,
}

impl SimulatedDevice {
    pub fn new(library: Arc<SimLibrary>) -> Self {
        Self {
            library,
            exchanges: Arc::new(AtomicUsize::new(0)),
            pending_menu: Vec::new(),
        }
    }

    fn availability(&mut self, transaction: u32, items: Vec<Message>) -> Message {
        let count = if items.is_empty() {
            NO_MENU_RESULTS_AVAILABLE
        } else {
            items.len() as u32
        };
        self.pending_menu = items;
        Message::response(
            transaction,
            kind::MENU_AVAILABLE,
            vec![Field::U32(0), Field::U32(count)],
        )
    }
}

#[async_trait]
impl Client for SimulatedDevice {
    async fn exchange(&mut self, request: Message) -> ClientResult<Message> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let transaction = request.transaction;
        Ok(match request.kind {
            kind::TRACK_LIST_REQ => {
                let rows = self
                    .library
                    .tracks
                    .iter()
                    .map(|(id, track)| self.library.listing_row(*id, track))
                    .collect();
                self.availability(transaction, rows)
            }
            kind::PLAYLIST_REQ => {
                let playlist_id = request.arg_number(2).unwrap_or(0);
                let rows = self
                    .library
                    .playlists
                    .get(&playlist_id)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| {
                                self.library
                                    .tracks
                                    .get(id)
                                    .map(|track| self.library.listing_row(*id, track))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                self.availability(transaction, rows)
            }
            kind::METADATA_REQ => {
                let id = request.arg_number(1).unwrap_or(0);
                let items = self.library.metadata_items(id).unwrap_or_default();
                self.availability(transaction, items)
            }
            kind::CUE_LIST_REQ => {
                let id = request.arg_number(1).unwrap_or(0);
                self.library.cue_response(transaction, id)
            }
            kind::ARTWORK_REQ => {
                let artwork_id = request.arg_number(1).unwrap_or(0);
                self.library.artwork_response(transaction, artwork_id)
            }
            other => {
                let id = request.arg_number(1).unwrap_or(0);
                self.library.blob_response(transaction, other, id)
            }
        })
    }

    async fn render_menu(&mut self, _slot: SlotRef, _item_count: u32) -> ClientResult<Vec<Message>> {
        let mut rendered = vec![Message::response(0, kind::MENU_HEADER, vec![])];
        rendered.append(&mut self.pending_menu);
        rendered.push(Message::footer());
        Ok(rendered)
    }
}

/// A pool that lends simulated sessions and counts the borrows.
pub struct SimulatedPool {
    pub library: Arc<SimLibrary>,
    /// Devices the pool can reach; borrowing any other fails.
    pub reachable: Vec<DeviceId>,
    pub sessions: Arc<AtomicUsize>,
    pub exchanges: Arc<AtomicUsize>,
}

impl SimulatedPool {
    pub fn new(library: SimLibrary, reachable: Vec<DeviceId>) -> Self {
        Self {
            library: Arc::new(library),
            reachable,
            sessions: Arc::new(AtomicUsize::new(0)),
            exchanges: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientPool for SimulatedPool {
    async fn session(&self, device: DeviceId) -> ClientResult<Box<dyn Client>> {
        if !self.reachable.contains(&device) {
            return Err(ClientError::Unavailable(device));
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedDevice {
            library: Arc::clone(&self.library),
            exchanges: Arc::clone(&self.exchanges),
            pending_menu: Vec::new(),
        }))
    }
}
