//! UI control descriptors.
//!
//! Pure projection from [`AllInfo`] to the list of controls the web surface
//! renders. Order: control input ports, then MIDI CC parameters, then patch
//! parameters, each in description order.

use serde::Serialize;

use crate::paraminfo::{AllInfo, Info, Point};

pub const ENDPOINT_ELEMENT: &str = "madigan-parameter";
pub const SLIDER_ELEMENT: &str = "madigan-slider";
pub const SELECT_ELEMENT: &str = "madigan-select";
pub const FILEPATH_ELEMENT: &str = "madigan-filepath";

/// Range URI of patch parameters holding a file path.
pub const ATOM_PATH: &str = "http://lv2plug.in/ns/ext/atom#Path";

/// How the UI reaches the underlying parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Control,
    Midicc,
    Patch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub element: &'static str,
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    pub key: String,
}

impl Endpoint {
    fn new(kind: EndpointKind, key: &str) -> Self {
        Self {
            element: ENDPOINT_ELEMENT,
            kind,
            key: key.to_string(),
        }
    }
}

/// Rendering hint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub element: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub integer: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
}

impl View {
    pub fn slider(min: f32, max: f32) -> Self {
        Self {
            element: SLIDER_ELEMENT,
            min: Some(min),
            max: Some(max),
            integer: true,
            points: Vec::new(),
        }
    }

    pub fn select(points: Vec<Point>) -> Self {
        Self {
            element: SELECT_ELEMENT,
            min: None,
            max: None,
            integer: false,
            points,
        }
    }

    pub fn filepath() -> Self {
        Self {
            element: FILEPATH_ELEMENT,
            min: None,
            max: None,
            integer: false,
            points: Vec::new(),
        }
    }

    /// Select over the scale for discrete parameters, slider otherwise.
    fn for_numeric(info: &Info) -> Self {
        if info.is_discrete() {
            Self::select(info.scale.clone())
        } else {
            Self::slider(info.min, info.max)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Control {
    pub name: String,
    pub view: View,
    pub endpoint: Endpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prio: Option<f32>,
}

impl Control {
    fn new(info: &Info, view: View, endpoint: Endpoint) -> Self {
        Self {
            name: info.name.clone(),
            view,
            endpoint,
            prio: (info.prio != 0.0).then_some(info.prio),
        }
    }
}

/// Placeholder until patch parameters carry a real scale.
fn placeholder_points() -> Vec<Point> {
    vec![Point::new("TBD", 0.0), Point::new("TBD", 100.0)]
}

/// Build the control list for a parameter description.
pub fn build_controls(description: &AllInfo) -> Vec<Control> {
    let ports = description
        .control_input
        .iter()
        .filter(|port| port.input && port.control)
        .map(|port| {
            Control::new(
                port,
                View::for_numeric(port),
                Endpoint::new(EndpointKind::Control, &port.index),
            )
        });

    let midi = description.midi_parameter.iter().map(|param| {
        Control::new(
            param,
            View::for_numeric(param),
            Endpoint::new(EndpointKind::Midicc, &param.midicc),
        )
    });

    let patch = description.patch_parameter.iter().map(|param| {
        let view = if param.range == ATOM_PATH {
            View::filepath()
        } else if !param.scale.is_empty() {
            View::select(param.scale.clone())
        } else {
            View::select(placeholder_points())
        };
        Control::new(param, view, Endpoint::new(EndpointKind::Patch, &param.uri))
    });

    ports.chain(midi).chain(patch).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn port(index: &str, name: &str) -> Info {
        Info {
            index: index.into(),
            name: name.into(),
            input: true,
            control: true,
            ..Info::default()
        }
    }

    #[test]
    fn cutoff_port_becomes_integer_slider() {
        let all = AllInfo {
            control_input: vec![Info {
                max: 127.0,
                ..port("0", "Cutoff")
            }],
            ..AllInfo::default()
        };

        let controls = build_controls(&all);
        assert_eq!(
            controls,
            vec![Control {
                name: "Cutoff".into(),
                view: View::slider(0.0, 127.0),
                endpoint: Endpoint::new(EndpointKind::Control, "0"),
                prio: None,
            }]
        );
        assert_eq!(
            serde_json::to_value(&controls).unwrap(),
            json!([{
                "name": "Cutoff",
                "view": { "element": "madigan-slider", "min": 0.0, "max": 127.0, "integer": true },
                "endpoint": { "element": "madigan-parameter", "type": "control", "key": "0" }
            }])
        );
    }

    #[test]
    fn skips_outputs_and_audio_ports() {
        let all = AllInfo {
            control_input: vec![
                Info {
                    input: false,
                    output: true,
                    ..port("1", "Level")
                },
                Info {
                    control: false,
                    audio: true,
                    ..port("2", "In L")
                },
                port("3", "Gain"),
            ],
            ..AllInfo::default()
        };
        let names: Vec<_> = build_controls(&all).into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["Gain"]);
    }

    #[test]
    fn toggles_and_enums_render_as_select() {
        let scale = vec![Point::new("Off", 0.0), Point::new("On", 1.0)];
        let all = AllInfo {
            control_input: vec![Info {
                toggle: true,
                scale: scale.clone(),
                ..port("4", "Bypass")
            }],
            midi_parameter: vec![Info {
                midicc: "80".into(),
                name: "Mode".into(),
                enumeration: true,
                scale: scale.clone(),
                ..Info::default()
            }],
            ..AllInfo::default()
        };

        let controls = build_controls(&all);
        assert_eq!(controls[0].view, View::select(scale.clone()));
        assert_eq!(controls[1].view, View::select(scale));
        assert_eq!(controls[1].endpoint, Endpoint::new(EndpointKind::Midicc, "80"));
    }

    #[test]
    fn patch_parameters_use_filepath_or_placeholder() {
        let all = AllInfo {
            patch_parameter: vec![
                Info {
                    uri: "urn:synth#sample".into(),
                    name: "Sample".into(),
                    range: ATOM_PATH.into(),
                    ..Info::default()
                },
                Info {
                    uri: "urn:synth#voice".into(),
                    name: "Voice".into(),
                    range: "http://lv2plug.in/ns/ext/atom#Int".into(),
                    ..Info::default()
                },
            ],
            ..AllInfo::default()
        };

        let controls = build_controls(&all);
        assert_eq!(controls[0].view, View::filepath());
        assert_eq!(controls[0].endpoint.kind, EndpointKind::Patch);
        assert_eq!(controls[0].endpoint.key, "urn:synth#sample");
        assert_eq!(controls[1].view.points, placeholder_points());
    }

    #[test]
    fn order_is_ports_then_midi_then_patch() {
        let all = AllInfo {
            control_input: vec![port("0", "A"), port("1", "B")],
            midi_parameter: vec![Info {
                midicc: "7".into(),
                name: "C".into(),
                max: 127.0,
                prio: 2.0,
                ..Info::default()
            }],
            patch_parameter: vec![Info {
                uri: "urn:p".into(),
                name: "D".into(),
                ..Info::default()
            }],
        };

        let first = build_controls(&all);
        let names: Vec<_> = first.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
        assert_eq!(first[2].prio, Some(2.0));
        assert_eq!(build_controls(&all), first);
    }

    #[test]
    fn empty_description_has_no_controls() {
        assert!(build_controls(&AllInfo::default()).is_empty());
    }
}
