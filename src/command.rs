//! Output commands
//!
//! A command is what a mapped trigger does on the output device. Presets
//! describe commands as short sequences such as `["cc", 10, 127]`; they are
//! validated once when the preset is loaded, so executing a command can
//! never fail on a bad descriptor.

use std::fmt;

use serde_yaml::Value;

use crate::error::MappingError;
use crate::midi::ControlChange;

/// Channel used for every outgoing message
pub const OUTPUT_CHANNEL: u8 = 0;

/// Command sent to the output device when a trigger matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Send a Control Change.
    ///
    /// With `value: None` the value of the triggering event is forwarded,
    /// falling back to 0 when the trigger carries none.
    SendCc { controller: u8, value: Option<u8> },
}

impl Command {
    /// Parse a command descriptor.
    ///
    /// `location` names the entry in diagnostics, e.g. `noteon.60`.
    pub fn parse(descriptor: &Value, location: &str) -> Result<Self, MappingError> {
        let items = match descriptor {
            Value::Sequence(items) => items,
            other => {
                return Err(MappingError::malformed(
                    location,
                    format!("expected a sequence, found {}", kind_of(other)),
                ))
            }
        };

        let Some((name, args)) = items.split_first() else {
            return Err(MappingError::malformed(location, "empty command"));
        };
        let name = name
            .as_str()
            .ok_or_else(|| MappingError::malformed(location, "command name must be a string"))?;

        match name {
            "cc" => {
                let (controller, value) = match args {
                    [controller] => (controller, None),
                    [controller, value] => (controller, Some(value)),
                    [] => {
                        return Err(MappingError::malformed(location, "cc needs a controller number"))
                    }
                    _ => {
                        return Err(MappingError::malformed(
                            location,
                            format!("cc takes at most 2 arguments, found {}", args.len()),
                        ))
                    }
                };
                Ok(Command::SendCc {
                    controller: data_byte(controller, location, "controller")?,
                    value: value
                        .map(|value| data_byte(value, location, "value"))
                        .transpose()?,
                })
            }
            other => Err(MappingError::malformed(
                location,
                format!("unknown command '{}'", other),
            )),
        }
    }

    /// Build the outgoing message.
    ///
    /// `dynamic_value` is the value carried by the triggering event, if any.
    pub fn render(&self, dynamic_value: Option<u8>) -> ControlChange {
        match *self {
            Command::SendCc { controller, value } => ControlChange {
                channel: OUTPUT_CHANNEL,
                controller,
                value: value.or(dynamic_value).unwrap_or(0),
            },
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SendCc {
                controller,
                value: Some(value),
            } => write!(f, "cc {} = {}", controller, value),
            Command::SendCc {
                controller,
                value: None,
            } => write!(f, "cc {} = <input>", controller),
        }
    }
}

fn data_byte(value: &Value, location: &str, what: &str) -> Result<u8, MappingError> {
    let n = value.as_i64().ok_or_else(|| {
        MappingError::malformed(
            location,
            format!("{} must be an integer, found {}", what, kind_of(value)),
        )
    })?;
    u8::try_from(n)
        .ok()
        .filter(|n| *n <= 127)
        .ok_or_else(|| MappingError::malformed(location, format!("{} {} out of range 0-127", what, n)))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_literal_cc() {
        let cmd = Command::parse(&yaml("[cc, 10, 127]"), "noteon.60").unwrap();
        assert_eq!(
            cmd,
            Command::SendCc {
                controller: 10,
                value: Some(127)
            }
        );
    }

    #[test]
    fn test_parse_dynamic_cc() {
        let cmd = Command::parse(&yaml("[\"cc\", 20]"), "controls.7").unwrap();
        assert_eq!(
            cmd,
            Command::SendCc {
                controller: 20,
                value: None
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        let cases = [
            "[]",
            "cc",
            "{cc: 10}",
            "[12, 10]",
            "[cc]",
            "[cc, 128]",
            "[cc, -1]",
            "[cc, 10, 200]",
            "[cc, ten]",
            "[cc, 1.5]",
            "[cc, 10, 20, 30]",
            "[pc, 10]",
        ];
        for case in cases {
            let err = Command::parse(&yaml(case), "noteon.1").unwrap_err();
            assert!(
                matches!(err, MappingError::MalformedCommand { .. }),
                "{} should be malformed, got {:?}",
                case,
                err
            );
        }
    }

    #[test]
    fn test_error_names_location() {
        let err = Command::parse(&yaml("[cc, 300]"), "controls.7").unwrap_err();
        assert!(err.to_string().contains("controls.7"));
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn test_render_value_resolution() {
        let literal = Command::SendCc {
            controller: 10,
            value: Some(127),
        };
        assert_eq!(literal.render(None).encode(), [0xB0, 10, 127]);
        // Literal wins over the trigger value
        assert_eq!(literal.render(Some(5)).encode(), [0xB0, 10, 127]);

        let dynamic = Command::SendCc {
            controller: 20,
            value: None,
        };
        assert_eq!(dynamic.render(Some(99)).encode(), [0xB0, 20, 99]);
        assert_eq!(dynamic.render(None).encode(), [0xB0, 20, 0]);
    }

    #[test]
    fn test_display() {
        let cmd = Command::SendCc {
            controller: 20,
            value: None,
        };
        assert_eq!(cmd.to_string(), "cc 20 = <input>");
    }
}
