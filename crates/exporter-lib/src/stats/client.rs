//! gRPC client for the per-VMI command socket
//!
//! Each VMI's launcher listens on a Unix domain socket. The client opens a
//! fresh channel per request, since these are local connections and a
//! failure to connect simply means nothing is listening on the other end.

use super::DomainStats;
use crate::error::ScrapeError;
use crate::proto::{DomainStatsResponse, EmptyRequest};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::UnixStream;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::debug;

/// RPC path of the domain stats call
pub const GET_DOMAIN_STATS_PATH: &str = "/kubevirt.cmd.v1.Cmd/GetDomainStats";

/// Fetches raw domain stats from a target socket
///
/// `Ok(None)` means there is nothing to report: the domain is gone or is
/// shutting down.
#[async_trait]
pub trait StatsFetcher: Send + Sync {
    async fn get_domain_stats(&self, socket: &str) -> Result<Option<DomainStats>, ScrapeError>;
}

/// Configuration for the command socket client
#[derive(Debug, Clone)]
pub struct CmdClientConfig {
    /// Time allowed to establish the socket connection
    pub connect_timeout: Duration,
    /// Time allowed for the stats call itself
    pub request_timeout: Duration,
}

impl Default for CmdClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Command socket client
#[derive(Debug, Clone, Default)]
pub struct CmdClient {
    config: CmdClientConfig,
}

impl CmdClient {
    pub fn new(config: CmdClientConfig) -> Self {
        Self { config }
    }

    /// Open a channel over the Unix socket at `socket`
    async fn connect(&self, socket: &str) -> Result<Channel, ScrapeError> {
        let path = socket.to_string();

        // The URI is ignored by the connector; tonic only needs a valid one.
        Endpoint::from_static("http://[::]:50051")
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .connect_with_connector(service_fn(move |_: Uri| {
                let path = path.clone();
                async move { UnixStream::connect(path).await }
            }))
            .await
            .map_err(|source| ScrapeError::Connect {
                socket: socket.to_string(),
                source,
            })
    }
}

#[async_trait]
impl StatsFetcher for CmdClient {
    async fn get_domain_stats(&self, socket: &str) -> Result<Option<DomainStats>, ScrapeError> {
        let channel = self.connect(socket).await?;

        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e)))?;

        let codec = tonic::codec::ProstCodec::<EmptyRequest, DomainStatsResponse>::default();
        let response = grpc
            .unary(
                tonic::Request::new(EmptyRequest {}),
                PathAndQuery::from_static(GET_DOMAIN_STATS_PATH),
                codec,
            )
            .await?
            .into_inner();

        decode_response(response)
    }
}

/// Interpret a stats reply
fn decode_response(response: DomainStatsResponse) -> Result<Option<DomainStats>, ScrapeError> {
    match response.response {
        Some(ref status) if !status.success => {
            return Err(ScrapeError::Rejected(status.message.clone()));
        }
        None => return Err(ScrapeError::Rejected("missing response status".to_string())),
        _ => {}
    }

    if response.domain_stats.is_empty() {
        return Ok(None);
    }

    let stats = DomainStats::from_json(&response.domain_stats)?;
    if stats.name.is_empty() {
        debug!("Domain stats without a name, domain is going away");
        return Ok(None);
    }

    Ok(Some(stats))
}
