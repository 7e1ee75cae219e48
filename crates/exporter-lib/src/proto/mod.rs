//! Protobuf messages of the launcher command service
//!
//! Only the messages needed by the stats client are declared here. The
//! service is `kubevirt.cmd.v1.Cmd`; the client speaks it without generated
//! stubs (see `stats::client`).

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct EmptyRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct Response {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DomainStatsResponse {
    #[prost(message, optional, tag = "1")]
    pub response: Option<Response>,
    /// JSON encoded domain stats, empty when the domain does not exist
    #[prost(string, tag = "2")]
    pub domain_stats: String,
}
