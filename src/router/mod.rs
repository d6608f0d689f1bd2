//! Router - routes events from one MIDI device to commands on another
//!
//! A running session owns:
//! - the input handle, whose driver callback only enqueues raw frames
//! - a bounded frame queue
//! - a dispatch worker task that owns the mapping table and the output handle
//!
//! Stopping closes the input, drops the queue sender, waits for the worker to
//! drain the queue and only then closes the output, so no write can happen
//! after [`Router::stop`] returns.

mod worker;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use crate::devices::{InputCallback, InputHandle, MidiBackend, OutputHandle};
use crate::error::{PortDirection, RouterError};
use crate::mapping::MappingTable;
use crate::midi::format_hex;
use worker::{DispatchWorker, InboundFrame};

/// Capacity of the queue between the driver callback and the worker
pub const FRAME_QUEUE_CAPACITY: usize = 1000;

type FrameSender = Arc<SyncMutex<Option<mpsc::Sender<InboundFrame>>>>;

/// State of a running router
struct Session {
    input: Box<dyn InputHandle>,
    /// Shared with the input callback; cleared on stop
    frames: FrameSender,
    worker: JoinHandle<Box<dyn OutputHandle>>,
    input_port: String,
    output_port: String,
}

/// Routes a single input device to a single output device
pub struct Router {
    backend: Arc<dyn MidiBackend>,
    /// `Some` while running; the lock serializes start/stop transitions
    session: Mutex<Option<Session>>,
}

impl Router {
    /// Create a stopped router on top of a MIDI backend
    pub fn new(backend: Arc<dyn MidiBackend>) -> Self {
        Self {
            backend,
            session: Mutex::new(None),
        }
    }

    /// Open both devices and start routing with `mapping`.
    ///
    /// Indices refer to the backend's current enumeration, which is
    /// refreshed here. On error the router stays stopped and every handle
    /// opened so far is closed again.
    pub async fn start(
        &self,
        input_index: usize,
        output_index: usize,
        mapping: MappingTable,
    ) -> Result<(), RouterError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(RouterError::AlreadyRunning);
        }

        let devices = self.backend.list_devices()?;
        check_index(PortDirection::Input, input_index, devices.inputs.len())?;
        check_index(PortDirection::Output, output_index, devices.outputs.len())?;

        let output = self.backend.open_output(output_index)?;
        let output_port = output.port_name().to_string();

        let (tx, rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let frames: FrameSender = Arc::new(SyncMutex::new(Some(tx)));

        let input = match self
            .backend
            .open_input(input_index, enqueue_frames(Arc::clone(&frames)))
        {
            Ok(input) => input,
            Err(e) => {
                output.close();
                return Err(e.into());
            }
        };
        let input_port = input.port_name().to_string();

        info!(
            "Routing '{}' -> '{}' ({} mapped triggers)",
            input_port,
            output_port,
            mapping.len()
        );
        let worker = tokio::spawn(DispatchWorker::new(rx, mapping, output).run());

        *session = Some(Session {
            input,
            frames,
            worker,
            input_port,
            output_port,
        });
        Ok(())
    }

    /// Stop routing and close both devices. Does nothing when stopped.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        let Some(Session {
            input,
            frames,
            worker,
            input_port,
            output_port,
        }) = session.take()
        else {
            return;
        };

        input.close();
        // Frames already queued are still routed before the worker exits
        frames.lock().take();

        match worker.await {
            Ok(output) => output.close(),
            Err(e) => error!("Dispatch worker for '{}' failed: {}", output_port, e),
        }

        info!("Stopped routing '{}' -> '{}'", input_port, output_port);
    }

    /// Whether a session is active
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Names of the input and output ports of the active session
    pub async fn active_ports(&self) -> Option<(String, String)> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| (s.input_port.clone(), s.output_port.clone()))
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            warn!("Router dropped while running '{}'", session.input_port);
            session.input.close();
            // The detached worker drains and drops the output handle
            session.frames.lock().take();
        }
    }
}

fn check_index(direction: PortDirection, index: usize, available: usize) -> Result<(), RouterError> {
    if index < available {
        Ok(())
    } else {
        Err(RouterError::InvalidDeviceIndex {
            direction,
            index,
            available,
        })
    }
}

/// Driver callback: copy the frame into the queue without blocking
fn enqueue_frames(frames: FrameSender) -> InputCallback {
    Box::new(move |timestamp_us: u64, data: &[u8]| {
        let frames = frames.lock();
        let Some(tx) = frames.as_ref() else {
            trace!("Frame after stop ignored: {}", format_hex(data));
            return;
        };

        let frame = InboundFrame {
            timestamp_us,
            data: data.to_vec(),
        };
        match tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                warn!("Frame queue full, dropped {}", format_hex(&frame.data))
            }
            Err(TrySendError::Closed(_)) => {}
        }
    })
}
