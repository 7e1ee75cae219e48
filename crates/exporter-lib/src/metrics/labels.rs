//! Label sets attached to VMI samples

use crate::models::VmiDescriptor;
use std::collections::HashSet;
use tracing::debug;

/// Labels present on every per-VMI sample, in this order
pub const COMMON_LABELS: [&str; 3] = ["node", "namespace", "name"];

/// Prefix applied to VMI metadata labels when turned into metric labels
pub const VMI_LABEL_PREFIX: &str = "kubernetes_vmi_label_";

/// Replace every character outside `[A-Za-z0-9_]` with an underscore
pub fn sanitize_label_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Fixed and dynamic label pairs for one VMI
///
/// Built once per target and reused for every sample of that target.
/// Custom per-family labels go between the common and the dynamic ones.
#[derive(Debug, Clone)]
pub struct VmiLabels {
    common_values: [String; 3],
    dynamic_names: Vec<String>,
    dynamic_values: Vec<String>,
}

impl VmiLabels {
    /// Keys that sanitize to the same label name keep only the first one in
    /// key order; the others are dropped.
    pub fn new(vmi: &VmiDescriptor) -> Self {
        let mut seen = HashSet::with_capacity(vmi.labels.len());
        let mut dynamic_names = Vec::with_capacity(vmi.labels.len());
        let mut dynamic_values = Vec::with_capacity(vmi.labels.len());

        for (key, value) in &vmi.labels {
            let name = format!("{}{}", VMI_LABEL_PREFIX, sanitize_label_name(key));
            if !seen.insert(name.clone()) {
                debug!(
                    namespace = %vmi.namespace,
                    name = %vmi.name,
                    key = %key,
                    label = %name,
                    "VMI label collides with another after sanitizing, skipping"
                );
                continue;
            }
            dynamic_names.push(name);
            dynamic_values.push(value.clone());
        }

        Self {
            common_values: [
                vmi.node_name.clone(),
                vmi.namespace.clone(),
                vmi.name.clone(),
            ],
            dynamic_names,
            dynamic_values,
        }
    }

    /// Full label name list for a family with the given custom labels
    pub fn names(&self, custom: &[&str]) -> Vec<String> {
        let mut names = Vec::with_capacity(3 + custom.len() + self.dynamic_names.len());
        names.extend(COMMON_LABELS.iter().map(|n| n.to_string()));
        names.extend(custom.iter().map(|n| n.to_string()));
        names.extend(self.dynamic_names.iter().cloned());
        names
    }

    /// Full label value list matching [`VmiLabels::names`]
    pub fn values(&self, custom: &[&str]) -> Vec<String> {
        let mut values = Vec::with_capacity(3 + custom.len() + self.dynamic_values.len());
        values.extend(self.common_values.iter().cloned());
        values.extend(custom.iter().map(|v| v.to_string()));
        values.extend(self.dynamic_values.iter().cloned());
        values
    }
}
