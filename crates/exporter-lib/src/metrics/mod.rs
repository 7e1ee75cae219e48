//! Metric samples produced for VMIs
//!
//! This module turns raw domain stats and cluster state into labeled
//! samples, and samples into Prometheus metric families for exposition.

mod domain;
mod encode;
mod labels;
mod phase;
mod sample;

pub use domain::{human_readable_vcpu_state, VmiMetrics};
pub use encode::into_families;
pub use labels::{sanitize_label_name, VmiLabels, COMMON_LABELS, VMI_LABEL_PREFIX};
pub use phase::{phase_count_samples, PhaseKey, ANNOTATION_PREFIX};
pub use sample::{Sample, ValueKind};

/// Name of the build information metric
pub const INFO_METRIC: &str = "kubevirt_info";

/// Build/version information sample, value is always 1
pub fn build_info_sample() -> Sample {
    let rustc = option_env!("RUSTC_VERSION").unwrap_or("unknown");

    Sample {
        name: INFO_METRIC.to_string(),
        help: "Version information".to_string(),
        kind: ValueKind::Gauge,
        value: 1.0,
        label_names: vec!["rustversion".to_string(), "kubeversion".to_string()],
        label_values: vec![rustc.to_string(), env!("CARGO_PKG_VERSION").to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_sample() {
        let sample = build_info_sample();
        assert_eq!(sample.name, INFO_METRIC);
        assert_eq!(sample.value, 1.0);
        assert_eq!(sample.label("kubeversion"), Some(env!("CARGO_PKG_VERSION")));
        assert!(sample.label("rustversion").is_some());
    }
}
