//! Channels that close with a reason.
//!
//! Every call half and every caller-visible result stream is one of these
//! channels: an in-order bounded pipe whose closure carries an optional
//! [`FsError`]. The reason lives in a slot shared by both halves and is
//! written at most once, so whichever side closes first decides how the
//! stream ended and the other side can read that decision after draining.
//!
//! Cancellation is in-band: a consumer closes its [`Receiver`] with a
//! reason, which makes the producer's next [`Sender::send`] fail with that
//! reason.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use treefs_proto::{FsError, FsResult};

/// Create a channel with room for `cap` in-flight items.
pub fn channel<T>(cap: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(cap.max(1));
    let slot = Arc::new(Slot::default());
    (
        Sender { tx, slot: slot.clone() },
        Receiver { rx, slot },
    )
}

/// The close-reason slot shared by a channel's two halves.
///
/// First close wins: a clean close records `None` and a later error close
/// cannot overwrite it, and vice versa.
#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    closed: bool,
    reason: Option<FsError>,
}

impl Slot {
    fn put(&self, reason: Option<FsError>) {
        let mut s = self.state.lock().unwrap();
        if !s.closed {
            s.closed = true;
            s.reason = reason;
        }
    }

    fn get(&self) -> Option<FsError> {
        self.state.lock().unwrap().reason.clone()
    }
}

/// The producing half.
pub struct Sender<T> {
    tx: mpsc::Sender<T>,
    slot: Arc<Slot>,
}

impl<T> Sender<T> {
    /// Send one item, suspending under backpressure.
    ///
    /// Fails once the receiving half is closed; the error is the
    /// receiver's close reason, or a synthesised i/o error when the
    /// receiver simply went away.
    pub async fn send(&self, item: T) -> FsResult<()> {
        self.tx
            .send(item)
            .await
            .map_err(|_| self.slot.get().unwrap_or_else(|| FsError::io("channel closed")))
    }

    /// Close this half, publishing `reason` as the stream's close reason.
    ///
    /// `None` is a clean end. Items already sent remain receivable.
    pub fn close(self, reason: Option<FsError>) {
        self.slot.put(reason);
    }

    /// The close reason recorded so far, if any.
    pub fn reason(&self) -> Option<FsError> {
        self.slot.get()
    }
}

/// The consuming half.
pub struct Receiver<T> {
    rx: mpsc::Receiver<T>,
    slot: Arc<Slot>,
}

impl<T> Receiver<T> {
    /// Receive the next item; `None` once the stream has ended.
    ///
    /// After `None`, [`reason`](Self::reason) yields the sticky close
    /// reason (`None` for a clean end).
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Close from the consuming side, e.g. to cancel a stream.
    ///
    /// Publishes `reason` and makes the producer's next send fail.
    pub fn close(&mut self, reason: Option<FsError>) {
        self.slot.put(reason);
        self.rx.close();
    }

    /// The close reason recorded so far, if any.
    pub fn reason(&self) -> Option<FsError> {
        self.slot.get()
    }

    /// Await exactly one item: the single-reply helper.
    ///
    /// An empty stream yields the close reason, or [`FsError::BadMsg`]
    /// when the stream ended cleanly without a reply.
    pub async fn one(mut self) -> FsResult<T> {
        match self.recv().await {
            Some(v) => Ok(v),
            None => Err(self.reason().unwrap_or(FsError::BadMsg)),
        }
    }

    /// Drain the stream and report how it ended: the error-only helper.
    pub async fn status(mut self) -> FsResult<()> {
        while self.recv().await.is_some() {}
        match self.reason() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
