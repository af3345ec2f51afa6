use async_trait::async_trait;

use crate::{lists::Item, Result};

/// Outcome of checking credentials.
#[derive(Clone, Debug, PartialEq)]
pub enum Validation {
    Success { item_id: String, item: Item },
    Failure(FailureReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// No item matches the identity.
    IdentityNotFound,
    /// The item has no stored secret.
    SecretNotSet,
    /// The secret does not match.
    SecretMismatch,
}

impl FailureReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdentityNotFound => "identity:notFound",
            Self::SecretNotSet => "secret:notSet",
            Self::SecretMismatch => "secret:mismatch",
        }
    }
}

/// A way of turning credentials into an item of one list.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Short strategy name used in logs, e.g. `password`.
    fn name(&self) -> &str;

    /// Key of the list whose items this strategy authenticates.
    fn list_key(&self) -> &str;

    /// Check credentials.
    ///
    /// # Errors
    /// Returns an error only for adapter or hashing faults; bad credentials are a
    /// `Validation::Failure`.
    async fn validate(&self, identity: &str, secret: &str) -> Result<Validation>;
}
