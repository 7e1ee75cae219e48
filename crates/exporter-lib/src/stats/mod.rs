//! Hypervisor domain statistics and the per-socket stats client
//!
//! Stats arrive as a JSON document embedded in the launcher's gRPC reply.
//! Every counter comes with a companion `*Set` flag; a counter whose flag
//! is false was not provided by the hypervisor and must not be reported.

mod client;
mod scraper;

pub use client::{CmdClient, CmdClientConfig, StatsFetcher, GET_DOMAIN_STATS_PATH};
pub use scraper::DomainStatsScraper;

use serde::{Deserialize, Serialize};

/// Snapshot of one domain's statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainStats {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(rename = "Memory", default)]
    pub memory: DomainStatsMemory,
    #[serde(rename = "Vcpu", default)]
    pub vcpu: Vec<DomainStatsVcpu>,
    #[serde(rename = "Block", default)]
    pub block: Vec<DomainStatsBlock>,
    #[serde(rename = "Net", default)]
    pub net: Vec<DomainStatsNet>,
}

/// Memory counters, all in KiB except the fault counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainStatsMemory {
    #[serde(rename = "RSSSet")]
    pub rss_set: bool,
    #[serde(rename = "RSS")]
    pub rss: u64,
    #[serde(rename = "AvailableSet")]
    pub available_set: bool,
    #[serde(rename = "Available")]
    pub available: u64,
    #[serde(rename = "UnusedSet")]
    pub unused_set: bool,
    #[serde(rename = "Unused")]
    pub unused: u64,
    #[serde(rename = "SwapInSet")]
    pub swap_in_set: bool,
    #[serde(rename = "SwapIn")]
    pub swap_in: u64,
    #[serde(rename = "SwapOutSet")]
    pub swap_out_set: bool,
    #[serde(rename = "SwapOut")]
    pub swap_out: u64,
    #[serde(rename = "MajorFaultSet")]
    pub major_fault_set: bool,
    #[serde(rename = "MajorFault")]
    pub major_fault: u64,
    #[serde(rename = "MinorFaultSet")]
    pub minor_fault_set: bool,
    #[serde(rename = "MinorFault")]
    pub minor_fault: u64,
    #[serde(rename = "ActualBalloonSet")]
    pub actual_balloon_set: bool,
    #[serde(rename = "ActualBalloon")]
    pub actual_balloon: u64,
    #[serde(rename = "UsableSet")]
    pub usable_set: bool,
    #[serde(rename = "Usable")]
    pub usable: u64,
    #[serde(rename = "TotalSet")]
    pub total_set: bool,
    #[serde(rename = "Total")]
    pub total: u64,
}

/// Per-vCPU counters, times in nanoseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainStatsVcpu {
    #[serde(rename = "StateSet")]
    pub state_set: bool,
    #[serde(rename = "State")]
    pub state: i32,
    #[serde(rename = "TimeSet")]
    pub time_set: bool,
    #[serde(rename = "Time")]
    pub time: u64,
    #[serde(rename = "WaitSet")]
    pub wait_set: bool,
    #[serde(rename = "Wait")]
    pub wait: u64,
}

/// Per-drive block device counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainStatsBlock {
    #[serde(rename = "NameSet")]
    pub name_set: bool,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "RdReqsSet")]
    pub rd_reqs_set: bool,
    #[serde(rename = "RdReqs")]
    pub rd_reqs: u64,
    #[serde(rename = "RdBytesSet")]
    pub rd_bytes_set: bool,
    #[serde(rename = "RdBytes")]
    pub rd_bytes: u64,
    #[serde(rename = "RdTimesSet")]
    pub rd_times_set: bool,
    #[serde(rename = "RdTimes")]
    pub rd_times: u64,
    #[serde(rename = "WrReqsSet")]
    pub wr_reqs_set: bool,
    #[serde(rename = "WrReqs")]
    pub wr_reqs: u64,
    #[serde(rename = "WrBytesSet")]
    pub wr_bytes_set: bool,
    #[serde(rename = "WrBytes")]
    pub wr_bytes: u64,
    #[serde(rename = "WrTimesSet")]
    pub wr_times_set: bool,
    #[serde(rename = "WrTimes")]
    pub wr_times: u64,
}

/// Per-interface network counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainStatsNet {
    #[serde(rename = "NameSet")]
    pub name_set: bool,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "AliasSet")]
    pub alias_set: bool,
    #[serde(rename = "Alias")]
    pub alias: String,
    #[serde(rename = "RxBytesSet")]
    pub rx_bytes_set: bool,
    #[serde(rename = "RxBytes")]
    pub rx_bytes: u64,
    #[serde(rename = "RxPktsSet")]
    pub rx_pkts_set: bool,
    #[serde(rename = "RxPkts")]
    pub rx_pkts: u64,
    #[serde(rename = "RxErrsSet")]
    pub rx_errs_set: bool,
    #[serde(rename = "RxErrs")]
    pub rx_errs: u64,
    #[serde(rename = "RxDropSet")]
    pub rx_drop_set: bool,
    #[serde(rename = "RxDrop")]
    pub rx_drop: u64,
    #[serde(rename = "TxBytesSet")]
    pub tx_bytes_set: bool,
    #[serde(rename = "TxBytes")]
    pub tx_bytes: u64,
    #[serde(rename = "TxPktsSet")]
    pub tx_pkts_set: bool,
    #[serde(rename = "TxPkts")]
    pub tx_pkts: u64,
    #[serde(rename = "TxErrsSet")]
    pub tx_errs_set: bool,
    #[serde(rename = "TxErrs")]
    pub tx_errs: u64,
    #[serde(rename = "TxDropSet")]
    pub tx_drop_set: bool,
    #[serde(rename = "TxDrop")]
    pub tx_drop: u64,
}

impl DomainStats {
    /// Parse the JSON document returned by the launcher
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
