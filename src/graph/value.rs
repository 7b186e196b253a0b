use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Typed property value accepted by scene-graph objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Number(f32),
    Vec3(Vec3),
    /// Linear RGB in the `0..=1` range.
    Color(Vec3),
    Text(String),
    List(Vec<f32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Number,
    Vec3,
    Color,
    Text,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Vec3 => "vector",
            Self::Color => "color",
            Self::Text => "text",
            Self::List => "list",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Color(_) => ValueKind::Color,
            Self::Text(_) => ValueKind::Text,
            Self::List(_) => ValueKind::List,
        }
    }

    /// Builds a color from 8-bit channels.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Color(Vec3::new(r as f32, g as f32, b as f32) / 255.0)
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vec3(value) | Self::Color(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Flattens the value into constructor arguments.
    pub fn to_args(&self) -> Vec<Value> {
        match self {
            Self::List(values) => values.iter().copied().map(Value::Number).collect(),
            Self::Vec3(v) => v.to_array().into_iter().map(Value::Number).collect(),
            other => vec![other.clone()],
        }
    }

    /// Converts the value into `kind` when the conversion is lossless.
    ///
    /// Numbers splat into vectors, three-element lists become vectors and
    /// vectors and colors convert into each other.
    pub fn coerce(self, kind: ValueKind) -> Option<Value> {
        if self.kind() == kind {
            return Some(self);
        }
        match (self, kind) {
            (Self::Number(n), ValueKind::Vec3) => Some(Self::Vec3(Vec3::splat(n))),
            (Self::Number(n), ValueKind::Color) => Some(Self::Color(Vec3::splat(n))),
            (Self::Number(n), ValueKind::List) => Some(Self::List(vec![n])),
            (Self::Vec3(v), ValueKind::Color) => Some(Self::Color(v)),
            (Self::Color(v), ValueKind::Vec3) => Some(Self::Vec3(v)),
            (Self::Vec3(v), ValueKind::List) => Some(Self::List(v.to_array().to_vec())),
            (Self::List(values), ValueKind::Vec3) if values.len() == 3 => {
                Some(Self::Vec3(Vec3::from_slice(&values)))
            }
            (Self::List(values), ValueKind::Color) if values.len() == 3 => {
                Some(Self::Color(Vec3::from_slice(&values)))
            }
            _ => None,
        }
    }

    /// Parses a template attribute.
    ///
    /// `true`/`false` become booleans, `#rrggbb` becomes a color, a single
    /// number stays a number, three numbers form a vector and any other
    /// count forms a list. Everything else is kept as text.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Some(color) = parse_hex_color(text) {
            return color;
        }
        let numbers: Option<Vec<f32>> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f32>().ok())
            .collect();
        match numbers {
            Some(numbers) if numbers.len() == 1 => Self::Number(numbers[0]),
            Some(numbers) if numbers.len() == 3 => Self::Vec3(Vec3::from_slice(&numbers)),
            Some(numbers) if !numbers.is_empty() => Self::List(numbers),
            _ => Self::Text(text.to_string()),
        }
    }
}

fn parse_hex_color(text: &str) -> Option<Value> {
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some(Value::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Number(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value as f32)
    }
}

impl From<Vec3> for Value {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
