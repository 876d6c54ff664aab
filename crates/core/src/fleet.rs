//! Game-server allocation: selector construction and the allocator port.
//!
//! The broker never picks a server itself. It hands the fleet allocator an
//! ordered list of [`AllocationSelector`]s and takes the first live instance
//! the allocator returns. Two implementations exist: [`LoopbackAllocator`]
//! here for local deployments, and the cluster client in `handoff-upstream`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Label every selector carries to pin allocations to one fleet.
pub const LABEL_FLEET: &str = "agones.dev/fleet";

/// Label used to prefer instances already hosting a given world.
pub const LABEL_WORLD: &str = "handoff.world";

/// Lifecycle state of a fleet instance as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameServerState {
    /// Already serving players; may have spare slots.
    Allocated,
    /// Warm and idle; allocating it takes it out of the ready pool.
    Ready,
}

/// Bounds on the number of free player slots an instance must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCapacity {
    pub min_available: u32,
    pub max_available: u32,
}

impl PlayerCapacity {
    pub fn new(min_available: u32, max_available: u32) -> Result<Self, CoreError> {
        if min_available == 0 {
            return Err(CoreError::Validation(
                "min_available must be at least 1".to_string(),
            ));
        }
        if min_available > max_available {
            return Err(CoreError::Validation(format!(
                "min_available ({min_available}) must not exceed max_available ({max_available})"
            )));
        }
        Ok(Self {
            min_available,
            max_available,
        })
    }
}

/// One entry of the ordered preference list sent to the allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSelector {
    pub state: GameServerState,
    pub players: PlayerCapacity,
    pub match_labels: BTreeMap<String, String>,
}

/// Static parameters used to build selectors for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPolicy {
    pub fleet: String,
    pub players: PlayerCapacity,
}

impl SelectorPolicy {
    /// Ordered selectors for one request: pack onto an allocated instance
    /// with spare capacity first, fall back to a cold ready instance.
    ///
    /// When `world` is given, the allocated and ready selectors require the
    /// world label, and a final ready selector without it lets an unlabelled
    /// warm instance pick up the world.
    pub fn selectors(&self, world: Option<&str>) -> Vec<AllocationSelector> {
        let mut fleet_only = BTreeMap::new();
        fleet_only.insert(LABEL_FLEET.to_string(), self.fleet.clone());

        let selector = |state, match_labels| AllocationSelector {
            state,
            players: self.players,
            match_labels,
        };

        match world.filter(|w| !w.is_empty()) {
            Some(world) => {
                let mut in_world = fleet_only.clone();
                in_world.insert(LABEL_WORLD.to_string(), world.to_string());
                vec![
                    selector(GameServerState::Allocated, in_world.clone()),
                    selector(GameServerState::Ready, in_world),
                    selector(GameServerState::Ready, fleet_only),
                ]
            }
            None => vec![
                selector(GameServerState::Allocated, fleet_only.clone()),
                selector(GameServerState::Ready, fleet_only),
            ],
        }
    }
}

/// A live instance handed out by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Orchestrator-assigned instance name. Tickets are bound to it.
    pub server_name: String,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// No instance matched any selector.
    #[error("No game server capacity available")]
    Exhausted,

    /// The allocation did not complete within the deadline.
    #[error("Allocation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Allocator unavailable: {0}")]
    Unavailable(String),
}

impl From<AllocationError> for CoreError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Exhausted => CoreError::ResourceExhausted(err.to_string()),
            other => CoreError::Internal(other.to_string()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FleetAllocator: Send + Sync {
    /// Allocate the first instance matching `selectors`, tried in order.
    async fn allocate(&self, selectors: &[AllocationSelector])
        -> Result<Allocation, AllocationError>;

    /// Hand an allocation back to the pool after a failure further down the
    /// pipeline. Returns `false` when the implementation cannot deallocate.
    async fn release(&self, _allocation: &Allocation) -> bool {
        false
    }

    /// Short name used in logs and the health endpoint.
    fn kind(&self) -> &'static str;
}

/// Allocator for local/dev deployments: always answers with one fixed
/// address, ignoring selectors.
#[derive(Debug, Clone)]
pub struct LoopbackAllocator {
    allocation: Allocation,
}

impl LoopbackAllocator {
    pub fn new(server_name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            allocation: Allocation {
                server_name: server_name.into(),
                address: address.into(),
                port,
            },
        }
    }
}

impl Default for LoopbackAllocator {
    fn default() -> Self {
        Self::new("local", "127.0.0.1", 7777)
    }
}

#[async_trait]
impl FleetAllocator for LoopbackAllocator {
    async fn allocate(
        &self,
        _selectors: &[AllocationSelector],
    ) -> Result<Allocation, AllocationError> {
        Ok(self.allocation.clone())
    }

    async fn release(&self, _allocation: &Allocation) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SelectorPolicy {
        SelectorPolicy {
            fleet: "game-server".to_string(),
            players: PlayerCapacity::new(1, 99).unwrap(),
        }
    }

    #[test]
    fn selectors_prefer_allocated_over_ready() {
        let selectors = policy().selectors(None);

        assert_eq!(selectors.len(), 2);
        assert_eq!(selectors[0].state, GameServerState::Allocated);
        assert_eq!(selectors[1].state, GameServerState::Ready);
        for s in &selectors {
            assert_eq!(s.players.min_available, 1);
            assert_eq!(s.players.max_available, 99);
            assert_eq!(s.match_labels.get(LABEL_FLEET).unwrap(), "game-server");
            assert!(!s.match_labels.contains_key(LABEL_WORLD));
        }
    }

    #[test]
    fn selectors_carry_world_label_when_known() {
        let selectors = policy().selectors(Some("frostreach"));

        assert_eq!(selectors.len(), 3);
        assert_eq!(selectors[0].state, GameServerState::Allocated);
        assert_eq!(selectors[1].state, GameServerState::Ready);
        for s in &selectors[..2] {
            assert_eq!(s.match_labels.get(LABEL_WORLD).unwrap(), "frostreach");
        }

        let blank = policy().selectors(Some(""));
        assert_eq!(blank.len(), 2);
        assert!(!blank[0].match_labels.contains_key(LABEL_WORLD));
    }

    #[test]
    fn unlabelled_ready_instance_is_last_resort() {
        let selectors = policy().selectors(Some("frostreach"));
        let last = selectors.last().unwrap();

        assert_eq!(last.state, GameServerState::Ready);
        assert!(!last.match_labels.contains_key(LABEL_WORLD));
        assert_eq!(last.match_labels.get(LABEL_FLEET).unwrap(), "game-server");
    }

    #[test]
    fn capacity_bounds_are_validated() {
        assert!(PlayerCapacity::new(0, 10).is_err());
        assert!(PlayerCapacity::new(5, 4).is_err());
        assert!(PlayerCapacity::new(4, 4).is_ok());
    }

    #[test]
    fn exhaustion_maps_to_resource_exhausted() {
        assert!(matches!(
            CoreError::from(AllocationError::Exhausted),
            CoreError::ResourceExhausted(_)
        ));
        assert!(matches!(
            CoreError::from(AllocationError::Unavailable("boom".into())),
            CoreError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn loopback_returns_fixed_address() {
        let allocator = LoopbackAllocator::default();
        let allocation = allocator.allocate(&policy().selectors(None)).await.unwrap();

        assert_eq!(allocation.address, "127.0.0.1");
        assert_eq!(allocation.port, 7777);
        assert_eq!(allocation.server_name, "local");
        assert_eq!(allocator.kind(), "loopback");
    }
}
