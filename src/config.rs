//! Preset loading
//!
//! Presets are YAML documents naming the advisory input/output devices and
//! a `mapping` section. Each entry is validated on its own: a malformed
//! entry is reported and skipped while the rest of the table still loads.
//!
//! ```yaml
//! inputDevice: "Digital Piano"
//! outputDevice: "KalterwindMapper Out"
//! description: "Sustain on C4"
//! mapping:
//!   noteon:
//!     60: ["cc", 64, 127]
//!   noteoff:
//!     action: send
//!     message: ["cc", 64, 0]
//!   controls:
//!     7: ["cc", 20]
//! ```

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::MappingError;
use crate::mapping::{MappingTable, NoteOffAction};

/// Root preset document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Free-form octave hint, only displayed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub octaves: Option<Value>,
    #[serde(default)]
    pub mapping: MappingSection,
}

/// Unvalidated `mapping` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingSection {
    #[serde(default)]
    pub noteon: BTreeMap<i64, Value>,
    #[serde(default)]
    pub noteoff: NoteOffSection,
    #[serde(default)]
    pub controls: BTreeMap<i64, Value>,
}

/// Unvalidated `noteoff` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NoteOffSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

impl MappingSection {
    /// Validate every entry and build the routing table.
    ///
    /// Returns the table built from the valid entries and one error per
    /// rejected entry.
    pub fn build(&self) -> (MappingTable, Vec<MappingError>) {
        let mut issues = Vec::new();

        let note_on = build_keyed("noteon", &self.noteon, &mut issues);
        let controls = build_keyed("controls", &self.controls, &mut issues);

        let note_off = match self.noteoff.action.as_deref() {
            None | Some("none") => NoteOffAction::None,
            Some("send") => match &self.noteoff.message {
                Some(message) => match Command::parse(message, "noteoff.message") {
                    Ok(cmd) => NoteOffAction::Send(cmd),
                    Err(err) => {
                        issues.push(err);
                        NoteOffAction::None
                    }
                },
                None => {
                    issues.push(MappingError::malformed(
                        "noteoff.message",
                        "action 'send' needs a message",
                    ));
                    NoteOffAction::None
                }
            },
            Some(other) => {
                issues.push(MappingError::UnknownNoteOffAction(other.to_string()));
                NoteOffAction::None
            }
        };

        (
            MappingTable {
                note_on,
                note_off,
                controls,
            },
            issues,
        )
    }
}

fn build_keyed(
    section: &'static str,
    entries: &BTreeMap<i64, Value>,
    issues: &mut Vec<MappingError>,
) -> HashMap<u8, Command> {
    let mut table = HashMap::with_capacity(entries.len());
    for (&key, descriptor) in entries {
        let Some(number) = u8::try_from(key).ok().filter(|n| *n <= 127) else {
            issues.push(MappingError::InvalidKey { section, key });
            continue;
        };
        match Command::parse(descriptor, &format!("{}.{}", section, key)) {
            Ok(cmd) => {
                table.insert(number, cmd);
            }
            Err(err) => issues.push(err),
        }
    }
    table
}

/// A loaded preset
#[derive(Debug, Clone)]
pub struct Preset {
    /// File name, used to select the preset
    pub name: String,
    pub path: PathBuf,
    pub document: PresetDocument,
    pub mapping: MappingTable,
    /// Entries that were skipped while building `mapping`
    pub issues: Vec<MappingError>,
}

impl Preset {
    /// Parse a preset from YAML text
    pub fn from_yaml(name: impl Into<String>, path: PathBuf, contents: &str) -> Result<Self> {
        let name = name.into();
        let document: PresetDocument = serde_yaml::from_str(contents)
            .with_context(|| format!("Failed to parse YAML preset: {}", path.display()))?;

        let (mapping, issues) = document.mapping.build();
        for issue in &issues {
            warn!("Preset '{}': {} (entry ignored)", name, issue);
        }
        debug!("Preset '{}' loaded with {} mapped triggers", name, mapping.len());

        Ok(Self {
            name,
            path,
            document,
            mapping,
            issues,
        })
    }

    /// Load a preset from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read preset file: {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_yaml(name, path.to_path_buf(), &contents)
    }

    /// Human readable summary of the preset's advisory fields
    pub fn info(&self) -> String {
        let octaves = match &self.document.octaves {
            Some(value) => serde_yaml::to_string(value)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            None => "-".to_string(),
        };
        format!(
            "Description: {}\nOctaves: {}\nInput: {}\nOutput: {}",
            self.document.description,
            octaves,
            self.document.input_device.as_deref().unwrap_or("-"),
            self.document.output_device.as_deref().unwrap_or("-"),
        )
    }
}

fn is_preset_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Load every preset below `dir`, sorted by file name.
///
/// Files that cannot be read or parsed are skipped with a warning. A missing
/// directory yields no presets.
pub async fn load_presets(dir: impl AsRef<Path>) -> Vec<Preset> {
    let mut presets = Vec::new();
    let mut pending = vec![dir.as_ref().to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping preset directory {}: {}", dir.display(), e);
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read preset directory {}: {}", dir.display(), e);
                    break;
                }
            };

            let path = entry.path();
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => pending.push(path),
                Ok(_) if is_preset_file(&path) => match Preset::load(&path).await {
                    Ok(preset) => presets.push(preset),
                    Err(e) => warn!("Skipping preset: {:#}", e),
                },
                Ok(_) => {}
                Err(e) => warn!("Failed to inspect {}: {}", path.display(), e),
            }
        }
    }

    presets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    presets
}

/// Find a preset by file name, or load it directly if `selector` is a path
pub async fn find_preset(presets: &[Preset], selector: &str) -> Result<Preset> {
    if let Some(preset) = presets.iter().find(|p| p.name == selector) {
        return Ok(preset.clone());
    }
    Preset::load(selector)
        .await
        .with_context(|| format!("Preset '{}' not found", selector))
}
