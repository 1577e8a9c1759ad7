//! Consumers of samples. The recorder is durable; displays are side channels.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::SinkError;
use crate::types::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// A failure ends the session.
    Durable,
    /// Failures are logged and the sink is dropped from delivery.
    SideChannel,
}

pub trait SampleSink: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> SinkKind {
        SinkKind::SideChannel
    }

    fn accept(&mut self, sample: &Arc<Sample>) -> Result<(), SinkError>;

    /// Flush and release resources. Called once when the session stops.
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Receiving end of a [`DisplayFeed`]: always holds the newest sample.
pub type DisplayReceiver = watch::Receiver<Option<Arc<Sample>>>;

/// Latest-value feed for a live view.
///
/// Sending never blocks; a renderer that falls behind simply sees the most
/// recent sample next time it looks. Closing the feed tells the renderer the
/// session is over.
pub struct DisplayFeed {
    tx: Option<watch::Sender<Option<Arc<Sample>>>>,
}

impl DisplayFeed {
    pub fn channel() -> (Self, DisplayReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Some(tx) }, rx)
    }

    pub fn update(&self, sample: Arc<Sample>) {
        if let Some(tx) = &self.tx {
            // no receiver left is fine: the display went away, the session goes on
            tx.send_replace(Some(sample));
        }
    }
}

impl SampleSink for DisplayFeed {
    fn name(&self) -> &str {
        "display"
    }

    fn accept(&mut self, sample: &Arc<Sample>) -> Result<(), SinkError> {
        self.update(Arc::clone(sample));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.tx = None;
        Ok(())
    }
}
