//! MIDI wire model
//!
//! Status nibbles for the inbound messages the router reacts to, and the
//! Control Change encoder used for everything it sends.

use std::fmt;

/// Status nibble of a Note Off message
pub const NOTE_OFF: u8 = 0x80;
/// Status nibble of a Note On message
pub const NOTE_ON: u8 = 0x90;
/// Status nibble of a Control Change message
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Outgoing Control Change: channel (0-15), controller (0-127), value (0-127)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

impl ControlChange {
    /// Encode to MIDI bytes. Out-of-range fields are masked to their wire width.
    pub fn encode(&self) -> [u8; 3] {
        [
            CONTROL_CHANGE | (self.channel & 0x0F),
            self.controller & 0x7F,
            self.value & 0x7F,
        ]
    }
}

impl fmt::Display for ControlChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CC ch:{} cc:{} v:{}",
            self.channel + 1,
            self.controller,
            self.value
        )
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_control_change() {
        let msg = ControlChange {
            channel: 0,
            controller: 10,
            value: 127,
        };
        assert_eq!(msg.encode(), [0xB0, 10, 127]);
        assert_eq!(msg.to_string(), "CC ch:1 cc:10 v:127");
    }

    #[test]
    fn test_encode_masks_data_bytes() {
        let msg = ControlChange {
            channel: 0x12,
            controller: 0x8A,
            value: 0x80,
        };
        assert_eq!(msg.encode(), [0xB2, 0x0A, 0x00]);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xB0, 0x0A, 0x7F]), "B0 0A 7F");
        assert_eq!(format_hex(&[]), "");
    }
}
