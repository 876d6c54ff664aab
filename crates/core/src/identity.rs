//! The authenticated identity behind an inbound call.

/// Subject and role names extracted from a validated credential.
///
/// How the claims are obtained (JWT, mTLS, ...) is the transport's concern;
/// the broker only ever sees this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Stable account identifier. Compared against `CharacterRecord::owner_id`.
    pub subject: String,
    /// Role names as issued by the identity provider.
    pub roles: Vec<String>,
}

impl Caller {
    pub fn new(subject: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            roles,
        }
    }
}
