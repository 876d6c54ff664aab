//! Character references, records, and the directory port that resolves them.
//!
//! Characters are owned by the external character service. The broker only
//! reads them: [`CharacterTarget`] says which character a request is about,
//! [`CharacterDirectory`] turns it into a canonical [`CharacterRecord`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::types::DbId;

/// Maximum length of a character name.
const MAX_NAME_LEN: usize = 64;

/// Which character a request refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterTarget {
    ById(DbId),
    ByName(String),
}

impl CharacterTarget {
    /// Reject targets that can never resolve: non-positive ids, blank or
    /// over-long names.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            CharacterTarget::ById(id) if *id <= 0 => Err(CoreError::Validation(format!(
                "Character id must be positive, got {id}"
            ))),
            CharacterTarget::ById(_) => Ok(()),
            CharacterTarget::ByName(name) => validate_character_name(name),
        }
    }
}

impl std::fmt::Display for CharacterTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharacterTarget::ById(id) => write!(f, "#{id}"),
            CharacterTarget::ByName(name) => f.write_str(name),
        }
    }
}

/// Validate a bare character name.
pub fn validate_character_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Character name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Character name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unspecified,
}

/// Where a character last was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// World (dimension) name. Used as an allocation label.
    pub world: String,
    pub map: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Canonical character record as served by the character service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: DbId,
    /// Subject of the account that owns this character.
    pub owner_id: String,
    pub name: String,
    pub gender: Gender,
    pub realm: String,
    /// Accumulated play time in seconds.
    pub play_time_secs: i64,
    pub location: Location,
}

impl CharacterRecord {
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_id == subject
    }
}

/// Errors from a [`CharacterDirectory`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory could not be reached or answered with garbage.
    #[error("Character directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DirectoryError> for CoreError {
    fn from(err: DirectoryError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

/// Read-only port onto the character service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterDirectory: Send + Sync {
    /// Resolve a target to its record. `Ok(None)` means the character does
    /// not exist.
    async fn get_character(
        &self,
        target: &CharacterTarget,
    ) -> Result<Option<CharacterRecord>, DirectoryError>;
}

/// Directory backed by an in-process map.
///
/// Used in local deployments (seeded from a JSON file) and in tests.
#[derive(Default)]
pub struct InMemoryCharacterDirectory {
    characters: RwLock<HashMap<DbId, CharacterRecord>>,
}

impl InMemoryCharacterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory pre-populated with `records`.
    pub fn with_characters(records: impl IntoIterator<Item = CharacterRecord>) -> Self {
        let characters = records.into_iter().map(|c| (c.id, c)).collect();
        Self {
            characters: RwLock::new(characters),
        }
    }

    /// Parse a JSON array of [`CharacterRecord`]s.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let records: Vec<CharacterRecord> = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid character seed data: {e}")))?;
        Ok(Self::with_characters(records))
    }

    pub async fn len(&self) -> usize {
        self.characters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.characters.read().await.is_empty()
    }
}

#[async_trait]
impl CharacterDirectory for InMemoryCharacterDirectory {
    async fn get_character(
        &self,
        target: &CharacterTarget,
    ) -> Result<Option<CharacterRecord>, DirectoryError> {
        let characters = self.characters.read().await;
        let found = match target {
            CharacterTarget::ById(id) => characters.get(id),
            CharacterTarget::ByName(name) => characters.values().find(|c| &c.name == name),
        };
        Ok(found.cloned())
    }
}
