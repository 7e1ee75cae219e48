//! Translation of domain stats into per-VMI samples

use super::labels::VmiLabels;
use super::sample::{Sample, ValueKind};
use crate::models::VmiDescriptor;
use crate::stats::{
    DomainStats, DomainStatsBlock, DomainStatsMemory, DomainStatsNet, DomainStatsVcpu,
};
use tracing::debug;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// libvirt vCPU states
const VCPU_OFFLINE: i32 = 0;
const VCPU_RUNNING: i32 = 1;
const VCPU_BLOCKED: i32 = 2;

/// Map a libvirt vCPU state to its label value
pub fn human_readable_vcpu_state(state: i32) -> &'static str {
    match state {
        VCPU_OFFLINE => "offline",
        VCPU_BLOCKED => "blocked",
        VCPU_RUNNING => "running",
        _ => "unknown",
    }
}

/// Sample builder for a single VMI
pub struct VmiMetrics {
    labels: VmiLabels,
    samples: Vec<Sample>,
}

impl VmiMetrics {
    pub fn new(vmi: &VmiDescriptor) -> Self {
        Self {
            labels: VmiLabels::new(vmi),
            samples: Vec::new(),
        }
    }

    /// Consume the builder and produce every sample the stats allow
    pub fn samples(mut self, stats: &DomainStats) -> Vec<Sample> {
        self.update_memory(&stats.memory);
        self.update_vcpu(&stats.vcpu);
        self.update_block(&stats.block);
        self.update_network(&stats.net);
        self.samples
    }

    fn push(
        &mut self,
        name: &str,
        help: &str,
        kind: ValueKind,
        value: f64,
        custom_names: &[&str],
        custom_values: &[&str],
    ) {
        let sample = Sample::new(
            name,
            help,
            kind,
            value,
            self.labels.names(custom_names),
            self.labels.values(custom_values),
        );

        match sample {
            Ok(sample) => self.samples.push(sample),
            Err(e) => debug!(error = %e, "Skipping invalid sample"),
        }
    }

    fn push_common(&mut self, name: &str, help: &str, kind: ValueKind, value: f64) {
        self.push(name, help, kind, value, &[], &[]);
    }

    fn update_memory(&mut self, mem: &DomainStatsMemory) {
        // (set, value in KiB or count, bytes?, name, help, kind)
        let counters = [
            (
                mem.rss_set,
                mem.rss,
                true,
                "kubevirt_vmi_memory_resident_bytes",
                "resident set size of the process running the domain.",
                ValueKind::Gauge,
            ),
            (
                mem.available_set,
                mem.available,
                true,
                "kubevirt_vmi_memory_available_bytes",
                "amount of usable memory as seen by the domain.",
                ValueKind::Gauge,
            ),
            (
                mem.unused_set,
                mem.unused,
                true,
                "kubevirt_vmi_memory_unused_bytes",
                "amount of unused memory as seen by the domain.",
                ValueKind::Gauge,
            ),
            (
                mem.swap_in_set,
                mem.swap_in,
                true,
                "kubevirt_vmi_memory_swap_in_traffic_bytes_total",
                "Swap in memory traffic in bytes",
                ValueKind::Gauge,
            ),
            (
                mem.swap_out_set,
                mem.swap_out,
                true,
                "kubevirt_vmi_memory_swap_out_traffic_bytes_total",
                "Swap out memory traffic in bytes",
                ValueKind::Gauge,
            ),
            (
                mem.major_fault_set,
                mem.major_fault,
                false,
                "kubevirt_vmi_memory_pgmajfault",
                "The number of page faults when disk IO was required.",
                ValueKind::Counter,
            ),
            (
                mem.minor_fault_set,
                mem.minor_fault,
                false,
                "kubevirt_vmi_memory_pgminfault",
                "The number of other page faults, when disk IO was not required.",
                ValueKind::Counter,
            ),
            (
                mem.actual_balloon_set,
                mem.actual_balloon,
                true,
                "kubevirt_vmi_memory_actual_balloon_bytes",
                "current balloon bytes.",
                ValueKind::Gauge,
            ),
            (
                mem.usable_set,
                mem.usable,
                true,
                "kubevirt_vmi_memory_usable_bytes",
                "The amount of memory which can be reclaimed by balloon without causing host swapping in bytes.",
                ValueKind::Gauge,
            ),
            (
                mem.total_set,
                mem.total,
                true,
                "kubevirt_vmi_memory_used_total_bytes",
                "The amount of memory in bytes used by the domain.",
                ValueKind::Gauge,
            ),
        ];

        for (set, raw, in_kib, name, help, kind) in counters {
            if !set {
                continue;
            }
            let value = if in_kib { raw as f64 * 1024.0 } else { raw as f64 };
            self.push_common(name, help, kind, value);
        }
    }

    fn update_vcpu(&mut self, vcpus: &[DomainStatsVcpu]) {
        for (idx, vcpu) in vcpus.iter().enumerate() {
            let id = idx.to_string();

            // Time and wait are both cumulative nanoseconds; exported as
            // fractional seconds without truncation
            if vcpu.state_set && vcpu.time_set {
                self.push(
                    "kubevirt_vmi_vcpu_seconds",
                    "Vcpu elapsed time.",
                    ValueKind::Counter,
                    vcpu.time as f64 / NANOS_PER_SECOND,
                    &["id", "state"],
                    &[&id, human_readable_vcpu_state(vcpu.state)],
                );
            }

            if vcpu.wait_set {
                self.push(
                    "kubevirt_vmi_vcpu_wait_seconds",
                    "vcpu time spent by waiting on I/O.",
                    ValueKind::Counter,
                    vcpu.wait as f64 / NANOS_PER_SECOND,
                    &["id"],
                    &[&id],
                );
            }
        }
    }

    fn update_block(&mut self, blocks: &[DomainStatsBlock]) {
        for (idx, block) in blocks.iter().enumerate() {
            if !block.name_set {
                debug!(block_index = idx, "Name not set for block device");
                continue;
            }

            let families = [
                (
                    "kubevirt_vmi_storage_iops_total",
                    "I/O operation performed.",
                    (block.rd_reqs_set, block.rd_reqs),
                    (block.wr_reqs_set, block.wr_reqs),
                ),
                (
                    "kubevirt_vmi_storage_traffic_bytes_total",
                    "storage traffic.",
                    (block.rd_bytes_set, block.rd_bytes),
                    (block.wr_bytes_set, block.wr_bytes),
                ),
                (
                    "kubevirt_vmi_storage_times_ms_total",
                    "storage operation time.",
                    (block.rd_times_set, block.rd_times),
                    (block.wr_times_set, block.wr_times),
                ),
            ];

            for (name, help, read, write) in families {
                for ((set, value), direction) in [(read, "read"), (write, "write")] {
                    if set {
                        self.push(
                            name,
                            help,
                            ValueKind::Counter,
                            value as f64,
                            &["drive", "type"],
                            &[&block.name, direction],
                        );
                    }
                }
            }
        }
    }

    fn update_network(&mut self, nets: &[DomainStatsNet]) {
        for net in nets {
            if !net.name_set {
                continue;
            }

            let iface = if net.alias_set { &net.alias } else { &net.name };

            if net.rx_bytes_set {
                self.push(
                    "kubevirt_vmi_network_traffic_bytes_total",
                    "network traffic.",
                    ValueKind::Counter,
                    net.rx_bytes as f64,
                    &["interface", "type"],
                    &[&net.name, "rx"],
                );
            }
            if net.tx_bytes_set {
                self.push(
                    "kubevirt_vmi_network_traffic_bytes_total",
                    "network traffic.",
                    ValueKind::Counter,
                    net.tx_bytes as f64,
                    &["interface", "type"],
                    &[&net.name, "tx"],
                );
            }

            let per_interface = [
                (
                    net.rx_bytes_set,
                    net.rx_bytes,
                    "kubevirt_vmi_network_receive_bytes_total",
                    "Network traffic receive in bytes",
                ),
                (
                    net.tx_bytes_set,
                    net.tx_bytes,
                    "kubevirt_vmi_network_transmit_bytes_total",
                    "Network traffic transmit in bytes",
                ),
                (
                    net.rx_pkts_set,
                    net.rx_pkts,
                    "kubevirt_vmi_network_receive_packets_total",
                    "Network traffic receive packets",
                ),
                (
                    net.tx_pkts_set,
                    net.tx_pkts,
                    "kubevirt_vmi_network_transmit_packets_total",
                    "Network traffic transmit packets",
                ),
                (
                    net.rx_errs_set,
                    net.rx_errs,
                    "kubevirt_vmi_network_receive_errors_total",
                    "Network receive error packets",
                ),
                (
                    net.tx_errs_set,
                    net.tx_errs,
                    "kubevirt_vmi_network_transmit_errors_total",
                    "Network transmit error packets",
                ),
                (
                    net.rx_drop_set,
                    net.rx_drop,
                    "kubevirt_vmi_network_receive_packets_dropped_total",
                    "The number of rx packets dropped on vNIC interfaces.",
                ),
                (
                    net.tx_drop_set,
                    net.tx_drop,
                    "kubevirt_vmi_network_transmit_packets_dropped_total",
                    "The number of tx packets dropped on vNIC interfaces.",
                ),
            ];

            for (set, value, name, help) in per_interface {
                if set {
                    self.push(
                        name,
                        help,
                        ValueKind::Counter,
                        value as f64,
                        &["interface"],
                        &[iface],
                    );
                }
            }
        }
    }
}
