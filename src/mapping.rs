//! Mapping table and event classification
//!
//! Inbound frames are classified into [`Trigger`]s and looked up in a
//! [`MappingTable`]. Every frame is handled on its own; there is no state
//! carried between frames.

use std::collections::HashMap;

use crate::command::Command;
use crate::midi::{ControlChange, CONTROL_CHANGE, NOTE_OFF, NOTE_ON};

/// What happens on any note release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteOffAction {
    #[default]
    None,
    Send(Command),
}

/// Routing table from inbound notes and controllers to output commands.
///
/// Note releases are not keyed by note: a single [`NoteOffAction`] applies
/// to every Note Off and every zero-velocity Note On.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    pub note_on: HashMap<u8, Command>,
    pub note_off: NoteOffAction,
    pub controls: HashMap<u8, Command>,
}

/// Routing-relevant classification of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    NoteOn { note: u8 },
    NoteOff,
    ControlChange { controller: u8, value: u8 },
}

impl Trigger {
    /// Classify a raw frame.
    ///
    /// Frames shorter than three bytes and all statuses other than Note On,
    /// Note Off and Control Change are not triggers. The channel is ignored.
    /// Data bytes are taken as delivered: a note of 188 is looked up as 188
    /// and a velocity of 128 counts as a press.
    pub fn classify(frame: &[u8]) -> Option<Self> {
        let [status, data1, data2, ..] = *frame else {
            return None;
        };
        match status & 0xF0 {
            NOTE_ON if data2 > 0 => Some(Trigger::NoteOn { note: data1 }),
            NOTE_ON | NOTE_OFF => Some(Trigger::NoteOff),
            CONTROL_CHANGE => Some(Trigger::ControlChange {
                controller: data1,
                value: data2,
            }),
            _ => None,
        }
    }
}

impl MappingTable {
    /// Look up the command for a trigger together with the dynamic value it
    /// carries. Unmapped triggers yield `None`.
    pub fn resolve(&self, trigger: Trigger) -> Option<(Command, Option<u8>)> {
        match trigger {
            Trigger::NoteOn { note } => self.note_on.get(&note).map(|cmd| (*cmd, None)),
            Trigger::NoteOff => match self.note_off {
                NoteOffAction::Send(cmd) => Some((cmd, None)),
                NoteOffAction::None => None,
            },
            Trigger::ControlChange { controller, value } => self
                .controls
                .get(&controller)
                .map(|cmd| (*cmd, Some(value))),
        }
    }

    /// Classify a raw frame and build the output message it maps to
    pub fn route(&self, frame: &[u8]) -> Option<ControlChange> {
        let trigger = Trigger::classify(frame)?;
        let (command, dynamic_value) = self.resolve(trigger)?;
        Some(command.render(dynamic_value))
    }

    /// Total number of mapped triggers
    pub fn len(&self) -> usize {
        let note_off = usize::from(matches!(self.note_off, NoteOffAction::Send(_)));
        self.note_on.len() + self.controls.len() + note_off
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
