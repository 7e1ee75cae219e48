use crate::error::SampleError;
use std::collections::HashSet;

/// Whether a sample is a monotonically increasing counter or a gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Counter,
    Gauge,
}

/// One emitted metric observation
///
/// `label_names` and `label_values` are order-correlated and always have
/// the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub help: String,
    pub kind: ValueKind,
    pub value: f64,
    pub label_names: Vec<String>,
    pub label_values: Vec<String>,
}

impl Sample {
    /// Create a sample, rejecting mismatched or repeated label names
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        kind: ValueKind,
        value: f64,
        label_names: Vec<String>,
        label_values: Vec<String>,
    ) -> Result<Self, SampleError> {
        let name = name.into();
        if label_names.len() != label_values.len() {
            return Err(SampleError::LabelCardinality {
                name,
                names: label_names.len(),
                values: label_values.len(),
            });
        }

        let mut seen = HashSet::with_capacity(label_names.len());
        if let Some(label) = label_names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(SampleError::DuplicateLabel {
                label: label.clone(),
                name,
            });
        }

        Ok(Self {
            name,
            help: help.into(),
            kind,
            value,
            label_names,
            label_values,
        })
    }

    /// Look up a label value by name
    pub fn label(&self, name: &str) -> Option<&str> {
        self.label_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.label_values[idx].as_str())
    }
}
