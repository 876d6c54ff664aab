//! Client for the fleet allocator's REST endpoint.
//!
//! Sends `POST {base}/gameserverallocation` with the ordered selector list
//! and maps the reply to an [`Allocation`]. The allocator answers
//! `429 Too Many Requests` when no instance matches any selector.

use std::collections::BTreeMap;

use async_trait::async_trait;
use handoff_core::fleet::{
    Allocation, AllocationError, AllocationSelector, FleetAllocator, GameServerState,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ensure_success, UpstreamError};

/// Name of the port the client connects to when an instance exposes several.
const DEFAULT_PORT_NAME: &str = "default";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllocationRequest<'a> {
    namespace: &'a str,
    game_server_selectors: Vec<WireSelector<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSelector<'a> {
    match_labels: &'a BTreeMap<String, String>,
    game_server_state: &'static str,
    players: WirePlayers,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePlayers {
    min_available: u32,
    max_available: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocationResponse {
    game_server_name: String,
    address: String,
    #[serde(default)]
    ports: Vec<WirePort>,
}

#[derive(Debug, Deserialize)]
struct WirePort {
    #[serde(default)]
    name: String,
    port: u16,
}

fn wire_state(state: GameServerState) -> &'static str {
    match state {
        GameServerState::Allocated => "ALLOCATED",
        GameServerState::Ready => "READY",
    }
}

fn build_request<'a>(
    namespace: &'a str,
    selectors: &'a [AllocationSelector],
) -> AllocationRequest<'a> {
    AllocationRequest {
        namespace,
        game_server_selectors: selectors
            .iter()
            .map(|s| WireSelector {
                match_labels: &s.match_labels,
                game_server_state: wire_state(s.state),
                players: WirePlayers {
                    min_available: s.players.min_available,
                    max_available: s.players.max_available,
                },
            })
            .collect(),
    }
}

impl AllocationResponse {
    fn into_allocation(self) -> Result<Allocation, AllocationError> {
        let port = self
            .ports
            .iter()
            .find(|p| p.name == DEFAULT_PORT_NAME)
            .or_else(|| self.ports.first())
            .map(|p| p.port)
            .ok_or_else(|| {
                AllocationError::Unavailable(format!(
                    "Allocated server {} exposes no ports",
                    self.game_server_name
                ))
            })?;

        Ok(Allocation {
            server_name: self.game_server_name,
            address: self.address,
            port,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`FleetAllocator`] talking to the cluster's allocator service.
pub struct ClusterAllocator {
    client: reqwest::Client,
    base_url: String,
    namespace: String,
}

impl ClusterAllocator {
    /// * `base_url` - allocator endpoint, e.g. `https://allocator.games:443`.
    /// * `namespace` - namespace the fleet lives in.
    pub fn new(base_url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, namespace)
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling, mTLS
    /// identity configured by the caller).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace: namespace.into(),
        }
    }

    async fn send(
        &self,
        selectors: &[AllocationSelector],
    ) -> Result<AllocationResponse, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/gameserverallocation", self.base_url))
            .json(&build_request(&self.namespace, selectors))
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

fn classify(err: UpstreamError) -> AllocationError {
    match err {
        UpstreamError::Api { status, .. } if status == StatusCode::TOO_MANY_REQUESTS.as_u16() => {
            AllocationError::Exhausted
        }
        other => AllocationError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl FleetAllocator for ClusterAllocator {
    async fn allocate(
        &self,
        selectors: &[AllocationSelector],
    ) -> Result<Allocation, AllocationError> {
        let response = self.send(selectors).await.map_err(classify)?;
        let allocation = response.into_allocation()?;
        tracing::debug!(
            server = %allocation.server_name,
            address = %allocation.address,
            port = allocation.port,
            "Fleet allocation succeeded"
        );
        Ok(allocation)
    }

    async fn release(&self, allocation: &Allocation) -> bool {
        // The allocator service has no deallocation endpoint; the instance
        // returns to the pool when its player count drops back to zero.
        tracing::warn!(
            server = %allocation.server_name,
            "Cluster allocator cannot release; instance left allocated"
        );
        false
    }

    fn kind(&self) -> &'static str {
        "cluster"
    }
}
