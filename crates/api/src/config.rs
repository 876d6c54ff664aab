use std::time::Duration;

use handoff_core::error::CoreError;
use handoff_core::fleet::{PlayerCapacity, SelectorPolicy};
use handoff_core::roles::{RoleCatalog, ROLE_ADMIN, ROLE_GAME_SERVER, ROLE_PLAYER};

use crate::auth::jwt::JwtConfig;

/// Which [`FleetAllocator`](handoff_core::fleet::FleetAllocator) the broker
/// is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Every allocation answers with a fixed loopback address.
    Local,
    /// Allocations go to the cluster's allocator service.
    Cluster,
}

impl DeploymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::Local => "local",
            DeploymentMode::Cluster => "cluster",
        }
    }
}

impl std::str::FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "dev" => Ok(DeploymentMode::Local),
            "cluster" | "prod" => Ok(DeploymentMode::Cluster),
            other => Err(format!("unknown deployment mode '{other}'")),
        }
    }
}

/// Fixed answer of the loopback allocator.
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    pub server_name: String,
    pub address: String,
    pub port: u16,
}

/// Parameters for cluster allocations.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Allocator endpoint. Required in cluster mode.
    pub allocator_url: Option<String>,
    pub namespace: String,
    pub fleet_name: String,
    pub min_available: u32,
    pub max_available: u32,
    pub allocation_timeout_secs: u64,
}

impl FleetConfig {
    pub fn selector_policy(&self) -> Result<SelectorPolicy, CoreError> {
        Ok(SelectorPolicy {
            fleet: self.fleet_name.clone(),
            players: PlayerCapacity::new(self.min_available, self.max_available)?,
        })
    }

    pub fn allocation_timeout(&self) -> Duration {
        Duration::from_secs(self.allocation_timeout_secs)
    }

    /// Reject capacity bounds the allocator would refuse and a zero deadline,
    /// which would fail every allocation.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.selector_policy()?;
        ensure_positive("ALLOCATION_TIMEOUT_SECS", self.allocation_timeout_secs)
    }
}

/// Ticket lifetime and reaping cadence.
#[derive(Debug, Clone)]
pub struct TicketConfig {
    pub ttl_secs: u64,
    pub reap_interval_secs: u64,
}

impl TicketConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// A zero TTL expires every ticket on issue; a zero interval cannot drive
    /// `tokio::time::interval`.
    pub fn validate(&self) -> Result<(), CoreError> {
        ensure_positive("TICKET_TTL_SECS", self.ttl_secs)?;
        ensure_positive("TICKET_REAP_INTERVAL_SECS", self.reap_interval_secs)
    }
}

fn ensure_positive(key: &str, secs: u64) -> Result<(), CoreError> {
    if secs == 0 {
        return Err(CoreError::Validation(format!(
            "{key} must be at least 1 second"
        )));
    }
    Ok(())
}

/// Role names granting each capability.
#[derive(Debug, Clone)]
pub struct RoleConfig {
    pub play: Vec<String>,
    pub manage_others: Vec<String>,
    pub game_server: Vec<String>,
}

impl RoleConfig {
    pub fn catalog(&self) -> Result<RoleCatalog, CoreError> {
        RoleCatalog::new(
            self.play.iter().cloned(),
            self.manage_others.iter().cloned(),
            self.game_server.iter().cloned(),
        )
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            play: vec![ROLE_PLAYER.to_string(), ROLE_ADMIN.to_string()],
            manage_others: vec![ROLE_ADMIN.to_string()],
            game_server: vec![ROLE_GAME_SERVER.to_string()],
        }
    }
}

/// Where character records come from.
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    /// Character service base URL. Without it an in-memory directory is used.
    pub service_url: Option<String>,
    /// Bearer token presented to the character service.
    pub service_token: Option<String>,
    /// JSON file seeding the in-memory directory.
    pub seed_file: Option<String>,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for background tasks at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    pub deployment: DeploymentMode,
    pub loopback: LoopbackConfig,
    pub fleet: FleetConfig,
    pub tickets: TicketConfig,
    pub roles: RoleConfig,
    pub directory: DirectoryConfig,
    /// Postgres URL for the ticket store. In-memory store when absent.
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                    |
    /// |-----------------------------|----------------------------|
    /// | `HOST`                      | `0.0.0.0`                  |
    /// | `PORT`                      | `3000`                     |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                       |
    /// | `DEPLOYMENT_MODE`           | `local`                    |
    /// | `LOOPBACK_SERVER_NAME`      | `local`                    |
    /// | `LOOPBACK_ADDRESS`          | `127.0.0.1`                |
    /// | `LOOPBACK_PORT`             | `7777`                     |
    /// | `ALLOCATOR_URL`             | -- (required for cluster)  |
    /// | `FLEET_NAMESPACE`           | `default`                  |
    /// | `FLEET_NAME`                | `game-server`              |
    /// | `FLEET_MIN_AVAILABLE`       | `1`                        |
    /// | `FLEET_MAX_AVAILABLE`       | `99`                       |
    /// | `ALLOCATION_TIMEOUT_SECS`   | `10`                       |
    /// | `TICKET_TTL_SECS`           | `60`                       |
    /// | `TICKET_REAP_INTERVAL_SECS` | `30`                       |
    /// | `ROLES_PLAY`                | `player,admin`             |
    /// | `ROLES_MANAGE_OTHERS`       | `admin`                    |
    /// | `ROLES_GAME_SERVER`         | `game-server`              |
    /// | `CHARACTER_SERVICE_URL`     | -- (in-memory directory)   |
    /// | `CHARACTER_SERVICE_TOKEN`   | --                         |
    /// | `CHARACTER_SEED_FILE`       | --                         |
    /// | `DATABASE_URL`              | -- (in-memory ticket store)|
    ///
    /// # Panics
    ///
    /// Panics on malformed values, on a zero ticket TTL, reap interval or
    /// allocation timeout, or when `DEPLOYMENT_MODE=cluster` is set without
    /// `ALLOCATOR_URL`.
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = env_parse("PORT", "3000");

        let cors_origins = env_list("CORS_ORIGINS", "http://localhost:5173");

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", "30");
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", "30");

        let jwt = JwtConfig::from_env();

        let deployment: DeploymentMode = env_or("DEPLOYMENT_MODE", "local")
            .parse()
            .unwrap_or_else(|e| panic!("DEPLOYMENT_MODE is invalid: {e}"));

        let loopback = LoopbackConfig {
            server_name: env_or("LOOPBACK_SERVER_NAME", "local"),
            address: env_or("LOOPBACK_ADDRESS", "127.0.0.1"),
            port: env_parse("LOOPBACK_PORT", "7777"),
        };

        let fleet = FleetConfig {
            allocator_url: env_opt("ALLOCATOR_URL"),
            namespace: env_or("FLEET_NAMESPACE", "default"),
            fleet_name: env_or("FLEET_NAME", "game-server"),
            min_available: env_parse("FLEET_MIN_AVAILABLE", "1"),
            max_available: env_parse("FLEET_MAX_AVAILABLE", "99"),
            allocation_timeout_secs: env_parse("ALLOCATION_TIMEOUT_SECS", "10"),
        };
        fleet
            .validate()
            .unwrap_or_else(|e| panic!("Invalid fleet configuration: {e}"));
        if deployment == DeploymentMode::Cluster {
            assert!(
                fleet.allocator_url.is_some(),
                "ALLOCATOR_URL must be set when DEPLOYMENT_MODE=cluster"
            );
        }

        let tickets = TicketConfig {
            ttl_secs: env_parse("TICKET_TTL_SECS", "60"),
            reap_interval_secs: env_parse("TICKET_REAP_INTERVAL_SECS", "30"),
        };
        tickets
            .validate()
            .unwrap_or_else(|e| panic!("Invalid ticket configuration: {e}"));

        let defaults = RoleConfig::default();
        let roles = RoleConfig {
            play: env_list("ROLES_PLAY", &defaults.play.join(",")),
            manage_others: env_list("ROLES_MANAGE_OTHERS", &defaults.manage_others.join(",")),
            game_server: env_list("ROLES_GAME_SERVER", &defaults.game_server.join(",")),
        };

        let directory = DirectoryConfig {
            service_url: env_opt("CHARACTER_SERVICE_URL"),
            service_token: env_opt("CHARACTER_SERVICE_TOKEN"),
            seed_file: env_opt("CHARACTER_SEED_FILE"),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            deployment,
            loopback,
            fleet,
            tickets,
            roles,
            directory,
            database_url: env_opt("DATABASE_URL"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: &str) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .unwrap_or_else(|e| panic!("{key} is invalid: {e}"))
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env_or(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
