use std::fmt;

use strum::{AsRefStr, Display};

/// Health level of a diagnostic, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, AsRefStr)]
pub enum Severity {
    #[default]
    #[strum(serialize = "OK")]
    Ok,
    #[strum(serialize = "WARN")]
    Warn,
    #[strum(serialize = "ERROR")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticField {
    pub key: &'static str,
    pub value: FieldValue,
}

impl DiagnosticField {
    pub fn int(key: &'static str, value: i64) -> Self {
        DiagnosticField {
            key,
            value: FieldValue::Int(value),
        }
    }

    pub fn float(key: &'static str, value: f64) -> Self {
        DiagnosticField {
            key,
            value: FieldValue::Float(value),
        }
    }
}

/// Snapshot handed to a diagnostic aggregator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticStatus {
    pub name: String,
    pub level: Severity,
    pub message: String,
    pub values: Vec<DiagnosticField>,
}

impl DiagnosticStatus {
    pub fn get(&self, key: &str) -> Option<FieldValue> {
        self.values.iter().find(|f| f.key == key).map(|f| f.value)
    }
}

impl fmt::Display for DiagnosticStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.name, self.message)?;
        for field in &self.values {
            write!(f, "\n    {}: {}", field.key, field.value)?;
        }
        Ok(())
    }
}
