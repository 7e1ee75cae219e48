//! Shared output sink for one collection cycle

use crate::error::SinkClosed;
use crate::metrics::Sample;
use tokio::sync::mpsc;

/// Write side of the sink, cloned into every worker
///
/// A target's samples are submitted as one batch, so a target contributes
/// either all of its samples or none.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: mpsc::UnboundedSender<Vec<Sample>>,
}

/// Read side of the sink, owned by the caller of the collector
#[derive(Debug)]
pub struct SinkReceiver {
    rx: mpsc::UnboundedReceiver<Vec<Sample>>,
}

impl SampleSink {
    /// Create a connected sink/receiver pair
    pub fn channel() -> (SampleSink, SinkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SampleSink { tx }, SinkReceiver { rx })
    }

    /// Submit one target's samples
    pub fn submit(&self, batch: Vec<Sample>) -> Result<(), SinkClosed> {
        self.tx.send(batch).map_err(|_| SinkClosed)
    }

    /// Whether the receiver has finalized or been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl SinkReceiver {
    /// Close the sink and collect everything submitted before closing
    ///
    /// Submissions racing with the close either land in the result or fail
    /// with [`SinkClosed`]; none are lost silently after this returns.
    pub async fn finalize(mut self) -> Vec<Sample> {
        self.rx.close();

        let mut samples = Vec::new();
        while let Some(batch) = self.rx.recv().await {
            samples.extend(batch);
        }
        samples
    }
}
