//! Trait abstractions for the remote database client sessions.
//!
//! The finder never owns connections. The per-device connection manager
//! implements these traits; services depend on them so that tests can
//! substitute simulated devices.

use async_trait::async_trait;
use thiserror::Error;

use super::message::Message;
use super::ProtocolError;
use crate::refs::{DeviceId, SlotRef};

/// Errors produced by a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying connection failed.
    #[error("connection I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent something the codec could not read.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No connection could be established or borrowed for the device.
    #[error("no database connection available for {0}")]
    Unavailable(DeviceId),
}

/// Convenient Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// One connected database session, bound to a single device.
///
/// Sessions are handed out by a [`ClientPool`] and returned to it when
/// dropped. Requests on one session are strictly sequential.
#[async_trait]
pub trait Client: Send {
    /// Sends a request and returns the single response message.
    ///
    /// Used for requests that answer with one message: availability
    /// responses to menu requests, cue lists, beat grids, waveforms, and
    /// artwork.
    async fn exchange(&mut self, request: Message) -> ClientResult<Message>;

    /// Renders the menu produced by the most recent menu request.
    ///
    /// `item_count` is the count announced by the availability response.
    /// Returns the full rendered stream: header, items, and footer.
    async fn render_menu(&mut self, slot: SlotRef, item_count: u32) -> ClientResult<Vec<Message>>;
}

/// The pooled connection manager, consumed but not implemented here.
///
/// Implementations maintain one database connection per reachable device
/// and lend it out one borrower at a time.
#[async_trait]
pub trait ClientPool: Send + Sync {
    /// Borrows a connected session for the given device.
    ///
    /// The session is returned to the pool when the boxed client is
    /// dropped, so it is released on every exit path.
    ///
    /// # Errors
    ///
    /// [`ClientError::Unavailable`] if the device is not connected and a
    /// connection cannot be established.
    async fn session(&self, device: DeviceId) -> ClientResult<Box<dyn Client>>;
}
