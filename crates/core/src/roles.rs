//! Role names and the capability catalog consulted by the broker.
//!
//! A [`RoleCatalog`] is built once at service construction and maps each
//! [`Capability`] to the set of role names that grant it. Callers present
//! role names (from their identity claims); the catalog decides what those
//! names are allowed to do.

use std::collections::BTreeSet;

use crate::error::CoreError;
use crate::identity::Caller;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_PLAYER: &str = "player";
pub const ROLE_GAME_SERVER: &str = "game-server";

/// Something a caller may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Request a game server for a character.
    Play,
    /// Act on characters owned by someone else.
    ManageOthers,
    /// Redeem tickets and initiate transfers. Never granted to players.
    GameServer,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Play => "play",
            Capability::ManageOthers => "manage-others",
            Capability::GameServer => "game-server",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RoleCatalog {
    play: BTreeSet<String>,
    manage_others: BTreeSet<String>,
    game_server: BTreeSet<String>,
}

impl RoleCatalog {
    /// Build a catalog from explicit role lists.
    ///
    /// Fails if a role granting [`Capability::GameServer`] also grants
    /// [`Capability::Play`]: a player credential must never be able to
    /// redeem tickets.
    pub fn new<I, S>(play: I, manage_others: I, game_server: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let catalog = Self {
            play: collect_roles(play),
            manage_others: collect_roles(manage_others),
            game_server: collect_roles(game_server),
        };

        if let Some(role) = catalog.game_server.intersection(&catalog.play).next() {
            return Err(CoreError::Validation(format!(
                "Role '{role}' cannot grant both play and game-server capabilities"
            )));
        }
        Ok(catalog)
    }

    fn roles_for(&self, capability: Capability) -> &BTreeSet<String> {
        match capability {
            Capability::Play => &self.play,
            Capability::ManageOthers => &self.manage_others,
            Capability::GameServer => &self.game_server,
        }
    }

    /// Whether any of the caller's roles grants `capability`.
    pub fn grants(&self, caller: &Caller, capability: Capability) -> bool {
        let granting = self.roles_for(capability);
        caller.roles.iter().any(|r| granting.contains(r))
    }

    /// Reject with `Forbidden` unless the caller holds `capability`.
    pub fn require(&self, caller: &Caller, capability: Capability) -> Result<(), CoreError> {
        if self.grants(caller, capability) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "The '{capability}' capability is required"
            )))
        }
    }
}

impl Default for RoleCatalog {
    /// `player` and `admin` may play, only `admin` may act for others, and
    /// only `game-server` may redeem or transfer.
    fn default() -> Self {
        Self {
            play: collect_roles([ROLE_PLAYER, ROLE_ADMIN]),
            manage_others: collect_roles([ROLE_ADMIN]),
            game_server: collect_roles([ROLE_GAME_SERVER]),
        }
    }
}

fn collect_roles<I, S>(roles: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    roles
        .into_iter()
        .map(Into::into)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(roles: &[&str]) -> Caller {
        Caller::new("user-1", roles.iter().map(|r| r.to_string()).collect())
    }

    #[test]
    fn default_catalog_grants_expected_capabilities() {
        let catalog = RoleCatalog::default();

        assert!(catalog.grants(&caller(&[ROLE_PLAYER]), Capability::Play));
        assert!(!catalog.grants(&caller(&[ROLE_PLAYER]), Capability::ManageOthers));
        assert!(!catalog.grants(&caller(&[ROLE_PLAYER]), Capability::GameServer));

        assert!(catalog.grants(&caller(&[ROLE_ADMIN]), Capability::ManageOthers));
        assert!(!catalog.grants(&caller(&[ROLE_ADMIN]), Capability::GameServer));

        assert!(catalog.grants(&caller(&[ROLE_GAME_SERVER]), Capability::GameServer));
        assert!(!catalog.grants(&caller(&[ROLE_GAME_SERVER]), Capability::Play));
    }

    #[test]
    fn caller_without_roles_is_rejected() {
        let catalog = RoleCatalog::default();
        let err = catalog.require(&caller(&[]), Capability::Play).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn custom_catalog_trims_and_ignores_blank_roles() {
        let catalog =
            RoleCatalog::new(vec![" gamer ", ""], vec!["gm"], vec!["dedicated"]).unwrap();
        assert!(catalog.grants(&caller(&["gamer"]), Capability::Play));
        assert!(!catalog.grants(&caller(&[""]), Capability::Play));
        assert!(catalog.grants(&caller(&["dedicated"]), Capability::GameServer));
    }

    #[test]
    fn overlapping_play_and_game_server_roles_are_rejected() {
        let result = RoleCatalog::new(vec!["shared"], vec![], vec!["shared"]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
