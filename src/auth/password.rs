use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use async_trait::async_trait;
use rand::RngCore;
use serde_json::Value;
use tracing::{debug, instrument};

use super::strategy::{AuthStrategy, FailureReason, Validation};
use crate::{
    lists::{item_id, List},
    Error, Result,
};

const SALT_BYTES: usize = 16;

/// Identity/secret authentication against Argon2 PHC hashes stored on items.
#[derive(Debug)]
pub struct PasswordAuthStrategy {
    list: List,
    identity_field: String,
    secret_field: String,
}

impl PasswordAuthStrategy {
    /// Authenticate items of `list` by `email`/`password`.
    #[must_use]
    pub fn new(list: List) -> Self {
        Self {
            list,
            identity_field: "email".to_string(),
            secret_field: "password".to_string(),
        }
    }

    #[must_use]
    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    #[must_use]
    pub fn with_secret_field(mut self, field: impl Into<String>) -> Self {
        self.secret_field = field.into();
        self
    }

    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    #[must_use]
    pub fn secret_field(&self) -> &str {
        &self.secret_field
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuthStrategy {
    fn name(&self) -> &str {
        "password"
    }

    fn list_key(&self) -> &str {
        self.list.key()
    }

    #[instrument(skip_all)]
    async fn validate(&self, identity: &str, secret: &str) -> Result<Validation> {
        let Some(item) = self
            .list
            .adapter()
            .find_one(&self.identity_field, identity)
            .await?
        else {
            debug!(list = self.list.key(), "No item matches the identity");
            return Ok(Validation::Failure(FailureReason::IdentityNotFound));
        };

        let Some(hash) = item.get(&self.secret_field).and_then(Value::as_str) else {
            return Ok(Validation::Failure(FailureReason::SecretNotSet));
        };

        // Argon2 is deliberately slow; keep it off the async workers.
        let hash = hash.to_string();
        let secret = secret.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_secret(&hash, &secret))
            .await
            .map_err(|err| Error::PasswordHash(err.to_string()))??;

        if !matches {
            return Ok(Validation::Failure(FailureReason::SecretMismatch));
        }

        let id = item_id(&item)
            .ok_or_else(|| Error::adapter(self.list.key(), "item has no string id"))?
            .to_string();
        Ok(Validation::Success { item_id: id, item })
    }
}

/// Hash a secret into an Argon2 PHC string suitable for storing on an item.
///
/// # Errors
/// Returns `Error::PasswordHash` if hashing fails.
pub fn hash_secret(secret: &str) -> Result<String> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|err| Error::PasswordHash(err.to_string()))?;
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| Error::PasswordHash(err.to_string()))
}

fn verify_secret(hash: &str, secret: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|err| Error::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}
