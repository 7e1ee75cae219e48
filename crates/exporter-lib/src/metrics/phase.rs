//! VMI count aggregate per (node, phase, os, workload, flavor)

use super::sample::{Sample, ValueKind};
use crate::models::VmiDescriptor;
use std::collections::BTreeMap;

/// Annotation prefix carrying the OS/workload/flavor hints
pub const ANNOTATION_PREFIX: &str = "vm.kubevirt.io/";

const PHASE_COUNT_METRIC: &str = "kubevirt_vmi_phase_count";
const NONE: &str = "<none>";

/// Grouping key of the phase count aggregate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhaseKey {
    pub phase: String,
    pub os: String,
    pub workload: String,
    pub flavor: String,
}

impl PhaseKey {
    pub fn from_vmi(vmi: &VmiDescriptor) -> Self {
        let annotation = |key: &str| {
            vmi.annotations
                .get(&format!("{}{}", ANNOTATION_PREFIX, key))
                .cloned()
                .unwrap_or_else(|| NONE.to_string())
        };

        Self {
            phase: vmi.phase.to_lowercase(),
            os: annotation("os"),
            workload: annotation("workload"),
            flavor: annotation("flavor"),
        }
    }
}

/// Count VMIs by [`PhaseKey`], one gauge sample per distinct key
///
/// Independent of any per-socket scrape; an empty VMI list yields no samples.
pub fn phase_count_samples(node_name: &str, vmis: &[VmiDescriptor]) -> Vec<Sample> {
    let mut counts: BTreeMap<PhaseKey, u64> = BTreeMap::new();
    for vmi in vmis {
        *counts.entry(PhaseKey::from_vmi(vmi)).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(key, count)| Sample {
            name: PHASE_COUNT_METRIC.to_string(),
            help: "VMI phase.".to_string(),
            kind: ValueKind::Gauge,
            value: count as f64,
            label_names: ["node", "phase", "os", "workload", "flavor"]
                .iter()
                .map(|n| n.to_string())
                .collect(),
            label_values: vec![
                node_name.to_string(),
                key.phase,
                key.os,
                key.workload,
                key.flavor,
            ],
        })
        .collect()
}
