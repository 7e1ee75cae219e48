//! Conversion of samples into Prometheus metric families

use super::sample::{Sample, ValueKind};
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use std::collections::BTreeMap;

/// Group samples by metric name into families, sorted by name
///
/// Help text and type of a family come from its first sample.
pub fn into_families(samples: Vec<Sample>) -> Vec<MetricFamily> {
    let mut families: BTreeMap<String, MetricFamily> = BTreeMap::new();

    for sample in samples {
        let family = families.entry(sample.name.clone()).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(sample.name.clone());
            family.set_help(sample.help.clone());
            family.set_field_type(match sample.kind {
                ValueKind::Counter => MetricType::COUNTER,
                ValueKind::Gauge => MetricType::GAUGE,
            });
            family
        });

        family.mut_metric().push(to_metric(&sample));
    }

    families.into_values().collect()
}

fn to_metric(sample: &Sample) -> Metric {
    let mut metric = Metric::default();

    for (name, value) in sample.label_names.iter().zip(&sample.label_values) {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }

    match sample.kind {
        ValueKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(sample.value);
            metric.set_counter(counter);
        }
        ValueKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(sample.value);
            metric.set_gauge(gauge);
        }
    }

    metric
}
