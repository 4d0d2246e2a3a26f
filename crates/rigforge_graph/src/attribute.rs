// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed attribute definitions for graph nodes.

use serde::{Deserialize, Serialize};

/// Data type an attribute was declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrType {
    /// String value
    String,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// Boolean value
    Bool,
    /// 3D vector
    Vector3,
    /// Single link slot
    Message,
    /// Multi-slot link array
    MessageArray,
}

impl AttrType {
    /// Whether this type is a link slot rather than a plain value
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Message | Self::MessageArray)
    }

    /// Get the display name for this type
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Vector3 => "vector3",
            Self::Message => "message",
            Self::MessageArray => "message[]",
        }
    }

    /// Default value for a freshly created attribute of this type.
    ///
    /// Strings default to the empty string, never to an unset sentinel.
    pub fn default_value(&self) -> Option<AttrValue> {
        match self {
            Self::String => Some(AttrValue::String(String::new())),
            Self::Int => Some(AttrValue::Int(0)),
            Self::Float => Some(AttrValue::Float(0.0)),
            Self::Bool => Some(AttrValue::Bool(false)),
            Self::Vector3 => Some(AttrValue::Vector3([0.0; 3])),
            Self::Message | Self::MessageArray => None,
        }
    }
}

/// Value stored in an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// String
    String(String),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// 3D vector
    Vector3([f64; 3]),
}

impl AttrValue {
    /// Get the attribute type for this value
    pub fn attr_type(&self) -> AttrType {
        match self {
            Self::String(_) => AttrType::String,
            Self::Int(_) => AttrType::Int,
            Self::Float(_) => AttrType::Float,
            Self::Bool(_) => AttrType::Bool,
            Self::Vector3(_) => AttrType::Vector3,
        }
    }

    /// Get as string slice if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as integer, accepting floats and bools
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            Self::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Get as float, accepting integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as bool, accepting integers
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Get as vector if possible
    pub fn as_vector3(&self) -> Option<[f64; 3]> {
        match self {
            Self::Vector3(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<[f64; 3]> for AttrValue {
    fn from(value: [f64; 3]) -> Self {
        Self::Vector3(value)
    }
}

/// An attribute on a graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Declared type
    pub attr_type: AttrType,
    /// Current value (`None` for link slots)
    pub value: Option<AttrValue>,
}

impl Attribute {
    /// Create a new attribute holding the type's default value
    pub fn new(name: impl Into<String>, attr_type: AttrType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            value: attr_type.default_value(),
        }
    }

    /// Create a new attribute from a value
    pub fn with_value(name: impl Into<String>, value: AttrValue) -> Self {
        Self {
            name: name.into(),
            attr_type: value.attr_type(),
            value: Some(value),
        }
    }

    /// Whether the stored value still matches the declared type
    pub fn is_consistent(&self) -> bool {
        match &self.value {
            Some(value) => value.attr_type() == self.attr_type,
            None => self.attr_type.is_link(),
        }
    }
}
