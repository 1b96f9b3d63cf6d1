//! Raw parameter metadata as produced by plugin introspection.

use serde::{Deserialize, Deserializer, Serialize};

/// One labelled value of a discrete scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub label: String,
    pub value: f32,
}

impl Point {
    pub fn new(label: impl Into<String>, value: f32) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Introspection output may carry `null` for an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(v: &f32) -> bool {
    *v == 0.0
}

/// A single control port, MIDI CC parameter or patch parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    /// Port index, for control ports.
    pub index: String,
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "is_false")]
    pub input: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub output: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub audio: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub control: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub atom: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub default: f32,
    #[serde(skip_serializing_if = "is_zero")]
    pub min: f32,
    #[serde(skip_serializing_if = "is_zero")]
    pub max: f32,
    /// Display priority.
    pub prio: f32,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub scale: Vec<Point>,
    #[serde(rename = "enum")]
    pub enumeration: bool,
    pub toggle: bool,
    /// Parameter URI, for MIDI and patch parameters.
    pub uri: String,
    /// CC number, for MIDI parameters.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub midicc: String,
    /// Value type URI, for patch parameters.
    pub range: String,
}

impl Info {
    /// Enumerated or toggled parameters render as a discrete choice.
    pub fn is_discrete(&self) -> bool {
        self.enumeration || self.toggle
    }
}

/// Everything known about one plugin's parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllInfo {
    #[serde(rename = "control", deserialize_with = "null_as_empty")]
    pub control_input: Vec<Info>,
    #[serde(rename = "midi", deserialize_with = "null_as_empty")]
    pub midi_parameter: Vec<Info>,
    #[serde(rename = "patch", deserialize_with = "null_as_empty")]
    pub patch_parameter: Vec<Info>,
}

impl AllInfo {
    pub fn is_empty(&self) -> bool {
        self.control_input.is_empty()
            && self.midi_parameter.is_empty()
            && self.patch_parameter.is_empty()
    }
}
