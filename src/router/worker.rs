//! Dispatch loop owned by a running router session

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::devices::OutputHandle;
use crate::mapping::MappingTable;
use crate::midi::format_hex;

/// Raw frame as delivered by the driver
#[derive(Debug, Clone)]
pub(crate) struct InboundFrame {
    /// Driver timestamp in microseconds, diagnostics only
    pub(crate) timestamp_us: u64,
    pub(crate) data: Vec<u8>,
}

/// Consumes inbound frames until every sender is gone
pub(crate) struct DispatchWorker {
    frames: mpsc::Receiver<InboundFrame>,
    mapping: MappingTable,
    output: Box<dyn OutputHandle>,
}

impl DispatchWorker {
    pub(crate) fn new(
        frames: mpsc::Receiver<InboundFrame>,
        mapping: MappingTable,
        output: Box<dyn OutputHandle>,
    ) -> Self {
        Self {
            frames,
            mapping,
            output,
        }
    }

    /// Route frames in arrival order.
    ///
    /// Returns the output handle once the queue is closed and drained so the
    /// caller can close it after the last write.
    pub(crate) async fn run(mut self) -> Box<dyn OutputHandle> {
        debug!("Dispatch worker started");

        while let Some(frame) = self.frames.recv().await {
            self.dispatch(&frame);
        }

        debug!("Dispatch worker drained");
        self.output
    }

    fn dispatch(&mut self, frame: &InboundFrame) {
        trace!("[{}us] RX {}", frame.timestamp_us, format_hex(&frame.data));

        let Some(message) = self.mapping.route(&frame.data) else {
            return;
        };

        let bytes = message.encode();
        debug!(
            "Map {} -> {} | {}",
            format_hex(&frame.data),
            message,
            self.output.port_name()
        );
        if let Err(e) = self.output.send(&bytes) {
            warn!("Dropped output {}: {}", format_hex(&bytes), e);
        }
    }
}
