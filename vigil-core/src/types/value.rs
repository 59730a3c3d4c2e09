//! Cell values and column typing

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The closed set of column types a dataframe can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Boolean,
    Categorical,
    Text,
    Duration,
    Tensor,
}

impl ColumnType {
    /// Whether distinct values of this type are tracked in schema enumerations.
    pub fn is_enumerable(&self) -> bool {
        !matches!(self, ColumnType::Tensor)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Categorical => "categorical",
            ColumnType::Text => "text",
            ColumnType::Duration => "duration",
            ColumnType::Tensor => "tensor",
        };
        write!(f, "{}", name)
    }
}

/// Dense row-major tensor cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self { shape, data }
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Element count implied by the shape matches the data length
    pub fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.data.len()
    }
}

/// A single dataframe cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Number(f64),
    Boolean(bool),
    Categorical(String),
    Text(String),
    /// Milliseconds
    Duration(i64),
    Tensor(Tensor),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Number(_) => ColumnType::Number,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Categorical(_) => ColumnType::Categorical,
            Value::Text(_) => ColumnType::Text,
            Value::Duration(_) => ColumnType::Duration,
            Value::Tensor(_) => ColumnType::Tensor,
        }
    }

    /// Canonical string stored in schema enumerations. Tensors have none.
    pub fn enumeration_key(&self) -> Option<String> {
        match self {
            Value::Number(n) => Some(n.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Categorical(s) | Value::Text(s) => Some(s.clone()),
            Value::Duration(ms) => Some(ms.to_string()),
            Value::Tensor(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Categorical(s) | Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Categorical(s) | Value::Text(s) => write!(f, "{}", s),
            Value::Duration(ms) => write!(f, "{}ms", ms),
            Value::Tensor(t) => write!(f, "tensor{:?}", t.shape),
        }
    }
}

/// Constraint on the values a column may take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Domain {
    Numeric { lower: f64, upper: f64 },
    Categories { values: BTreeSet<String> },
}

impl Domain {
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (Domain::Numeric { lower, upper }, Value::Number(n)) => n >= lower && n <= upper,
            (Domain::Numeric { lower, upper }, Value::Duration(ms)) => {
                let ms = *ms as f64;
                ms >= *lower && ms <= *upper
            }
            (Domain::Categories { values }, v) => v
                .enumeration_key()
                .map(|key| values.contains(&key))
                .unwrap_or(false),
            _ => false,
        }
    }
}
