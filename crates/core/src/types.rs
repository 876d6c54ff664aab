/// Character primary keys are issued by the character service as BIGINT.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque single-use ticket identifier handed to clients.
pub type ConnectionId = uuid::Uuid;
