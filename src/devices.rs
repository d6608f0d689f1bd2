//! MIDI device access
//!
//! The router talks to the MIDI driver only through [`MidiBackend`], which
//! enumerates ports and opens them by index. [`MidirBackend`] is the
//! production implementation on top of `midir`.

use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

use crate::error::{DeviceError, PortDirection};

/// Receives every inbound frame together with the driver timestamp (µs)
pub type InputCallback = Box<dyn FnMut(u64, &[u8]) + Send + 'static>;

/// Ordered port names as reported by the driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl DeviceList {
    /// Resolve device names to port indices.
    ///
    /// An exact name match wins; otherwise the first port whose name
    /// contains the pattern (case-insensitive) is used, since drivers often
    /// decorate names with client ids.
    pub fn resolve_indices(&self, input_name: &str, output_name: &str) -> (Option<usize>, Option<usize>) {
        (
            find_port(&self.inputs, input_name),
            find_port(&self.outputs, output_name),
        )
    }
}

fn find_port(names: &[String], pattern: &str) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }
    if let Some(index) = names.iter().position(|name| name == pattern) {
        return Some(index);
    }
    let pattern = pattern.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&pattern))
}

/// An open input port. Dropping the handle unregisters its callback.
pub trait InputHandle: Send {
    fn port_name(&self) -> &str;

    /// Close the port; the callback is dropped before this returns.
    fn close(self: Box<Self>);
}

/// An open output port
pub trait OutputHandle: Send {
    fn port_name(&self) -> &str;

    fn send(&mut self, data: &[u8]) -> Result<(), DeviceError>;

    fn close(self: Box<Self>);
}

/// Driver seam used by the router
pub trait MidiBackend: Send + Sync {
    /// Enumerate the currently available ports
    fn list_devices(&self) -> Result<DeviceList, DeviceError>;

    /// Open the input port at `index` and deliver its frames to `callback`
    /// on a driver-owned thread.
    fn open_input(&self, index: usize, callback: InputCallback) -> Result<Box<dyn InputHandle>, DeviceError>;

    /// Open the output port at `index`
    fn open_output(&self, index: usize) -> Result<Box<dyn OutputHandle>, DeviceError>;
}

/// `midir` backed driver
#[derive(Debug, Clone)]
pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

impl Default for MidirBackend {
    fn default() -> Self {
        Self::new("KalterwindMapper")
    }
}

impl MidiBackend for MidirBackend {
    fn list_devices(&self) -> Result<DeviceList, DeviceError> {
        let midi_in = MidiInput::new(&format!("{}-Scanner", self.client_name))?;
        let midi_out = MidiOutput::new(&format!("{}-Scanner", self.client_name))?;

        // Keep positions aligned with `ports()` even when a name is unreadable
        let inputs = midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(i, port)| midi_in.port_name(port).unwrap_or_else(|_| format!("Input {}", i)))
            .collect();
        let outputs = midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(i, port)| midi_out.port_name(port).unwrap_or_else(|_| format!("Output {}", i)))
            .collect();

        Ok(DeviceList { inputs, outputs })
    }

    fn open_input(&self, index: usize, mut callback: InputCallback) -> Result<Box<dyn InputHandle>, DeviceError> {
        let midi_in = MidiInput::new(&format!("{}-Input", self.client_name))?;

        let port = midi_in
            .ports()
            .get(index)
            .cloned()
            .ok_or(DeviceError::PortUnavailable {
                direction: PortDirection::Input,
                index,
            })?;
        let port_name = midi_in
            .port_name(&port)
            .unwrap_or_else(|_| format!("Input {}", index));

        let connection = midi_in
            .connect(
                &port,
                &self.client_name,
                move |stamp, data, _| callback(stamp, data),
                (),
            )
            .map_err(|e| DeviceError::Open {
                direction: PortDirection::Input,
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        info!("Opened input port: {}", port_name);
        Ok(Box::new(MidirInput {
            port_name,
            connection,
        }))
    }

    fn open_output(&self, index: usize) -> Result<Box<dyn OutputHandle>, DeviceError> {
        let midi_out = MidiOutput::new(&format!("{}-Output", self.client_name))?;

        let port = midi_out
            .ports()
            .get(index)
            .cloned()
            .ok_or(DeviceError::PortUnavailable {
                direction: PortDirection::Output,
                index,
            })?;
        let port_name = midi_out
            .port_name(&port)
            .unwrap_or_else(|_| format!("Output {}", index));

        let connection = midi_out
            .connect(&port, &self.client_name)
            .map_err(|e| DeviceError::Open {
                direction: PortDirection::Output,
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        info!("Opened output port: {}", port_name);
        Ok(Box::new(MidirOutput {
            port_name,
            connection,
        }))
    }
}

struct MidirInput {
    port_name: String,
    connection: MidiInputConnection<()>,
}

impl InputHandle for MidirInput {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn close(self: Box<Self>) {
        let MidirInput {
            port_name,
            connection,
        } = *self;
        let _ = connection.close();
        debug!("Closed input port: {}", port_name);
    }
}

struct MidirOutput {
    port_name: String,
    connection: MidiOutputConnection,
}

impl OutputHandle for MidirOutput {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        self.connection.send(data).map_err(|e| DeviceError::Send {
            port: self.port_name.clone(),
            reason: e.to_string(),
        })
    }

    fn close(self: Box<Self>) {
        let MidirOutput {
            port_name,
            connection,
        } = *self;
        let _ = connection.close();
        debug!("Closed output port: {}", port_name);
    }
}

/// Virtual ports other applications can connect to.
///
/// Data arriving on the virtual input is only logged; it is never echoed to
/// the virtual output so that no feedback loop can form.
pub struct VirtualPorts {
    _input: MidiInputConnection<()>,
    _output: MidiOutputConnection,
}

impl std::fmt::Debug for VirtualPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualPorts").finish_non_exhaustive()
    }
}

/// Name of the published virtual input port
pub const VIRTUAL_IN_NAME: &str = "KalterwindMapper In";
/// Name of the published virtual output port
pub const VIRTUAL_OUT_NAME: &str = "KalterwindMapper Out";

impl VirtualPorts {
    #[cfg(unix)]
    pub fn create() -> Result<Self, DeviceError> {
        use crate::midi::format_hex;
        use midir::os::unix::{VirtualInput, VirtualOutput};

        let midi_in = MidiInput::new(VIRTUAL_IN_NAME)?;
        let input = midi_in
            .create_virtual(
                VIRTUAL_IN_NAME,
                |_stamp, data, _| debug!("[virtual in] {}", format_hex(data)),
                (),
            )
            .map_err(|e| DeviceError::Open {
                direction: PortDirection::Input,
                port: VIRTUAL_IN_NAME.to_string(),
                reason: e.to_string(),
            })?;

        let midi_out = MidiOutput::new(VIRTUAL_OUT_NAME)?;
        let output = midi_out
            .create_virtual(VIRTUAL_OUT_NAME)
            .map_err(|e| DeviceError::Open {
                direction: PortDirection::Output,
                port: VIRTUAL_OUT_NAME.to_string(),
                reason: e.to_string(),
            })?;

        info!("Virtual ports up: {} / {}", VIRTUAL_IN_NAME, VIRTUAL_OUT_NAME);
        Ok(Self {
            _input: input,
            _output: output,
        })
    }

    #[cfg(not(unix))]
    pub fn create() -> Result<Self, DeviceError> {
        Err(DeviceError::VirtualUnsupported)
    }
}
