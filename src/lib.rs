//! Kalterwind Mapper
//!
//! Routes live MIDI events from one device to Control Change commands on
//! another, following a mapping table loaded from a YAML preset.

pub mod command;
pub mod config;
pub mod devices;
pub mod error;
pub mod mapping;
pub mod midi;
pub mod router;

pub use command::Command;
pub use config::{load_presets, Preset};
pub use devices::{DeviceList, MidiBackend, MidirBackend, VirtualPorts};
pub use error::{DeviceError, MappingError, PortDirection, RouterError};
pub use mapping::{MappingTable, NoteOffAction, Trigger};
pub use router::Router;
