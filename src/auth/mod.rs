//! Authenticated principal resolution and session lifecycle.
//!
//! Flow Overview: after the session layer attaches a [`Session`], [`populate`]
//! reads `keystoneListKey`/`keystoneItemId`, loads the item through the list's
//! adapter and attaches an [`AuthedItem`] to the request. Sign-in and sign-out go
//! through [`start_authed_session`] and [`end_authed_session`], which are the
//! only transitions between anonymous and authenticated sessions.

mod password;
mod strategy;

pub use password::{hash_secret, PasswordAuthStrategy};
pub use strategy::{AuthStrategy, FailureReason, Validation};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{str::FromStr, sync::Arc};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    lists::{Item, Lists},
    session::Session,
    Result,
};

/// The item behind the current session, attached to request extensions.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthedItem {
    #[schema(value_type = Object)]
    pub user: Item,
    pub authed_list_key: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedItem
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// What to do with a session whose list or item no longer exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StaleSessionPolicy {
    /// Leave the session as is and continue unauthenticated.
    #[default]
    Ignore,
    /// Regenerate the session, dropping the dangling identity.
    Regenerate,
}

impl StaleSessionPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Regenerate => "regenerate",
        }
    }
}

impl FromStr for StaleSessionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "regenerate" => Ok(Self::Regenerate),
            other => Err(format!("invalid stale session policy: {other}")),
        }
    }
}

/// State for the population stage.
#[derive(Clone, Debug)]
pub struct AuthContext {
    lists: Arc<Lists>,
    stale_policy: StaleSessionPolicy,
}

impl AuthContext {
    #[must_use]
    pub fn new(lists: Arc<Lists>, stale_policy: StaleSessionPolicy) -> Self {
        Self {
            lists,
            stale_policy,
        }
    }

    #[must_use]
    pub fn lists(&self) -> &Lists {
        &self.lists
    }

    #[must_use]
    pub fn stale_policy(&self) -> StaleSessionPolicy {
        self.stale_policy
    }
}

/// Middleware stage attaching the [`AuthedItem`] for the current session.
///
/// Requests without a session, or whose session names a missing list or item,
/// continue without an identity. Adapter and store faults become a 500.
pub async fn populate(
    State(ctx): State<AuthContext>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return next.run(request).await;
    };

    match resolve_authed_item(&ctx, &session).await {
        Ok(Some(authed)) => {
            request.extensions_mut().insert(authed);
        }
        Ok(None) => {}
        Err(err) => return err.into_response(),
    }

    next.run(request).await
}

/// Load the item a session points at.
///
/// # Errors
/// Returns adapter faults, and store faults when the stale policy regenerates.
pub async fn resolve_authed_item(ctx: &AuthContext, session: &Session) -> Result<Option<AuthedItem>> {
    let data = session.data().await;
    let (Some(list_key), Some(item_id)) = (data.keystone_list_key, data.keystone_item_id) else {
        return Ok(None);
    };

    let Some(list) = ctx.lists.get(&list_key) else {
        debug!(list_key = %list_key, "Session references an unknown list");
        handle_stale(ctx, session).await?;
        return Ok(None);
    };

    match list.adapter().find_by_id(&item_id).await? {
        Some(user) => Ok(Some(AuthedItem {
            user: list.public_item(user),
            authed_list_key: list_key,
        })),
        None => {
            debug!(list_key = %list_key, item_id = %item_id, "Session references a missing item");
            handle_stale(ctx, session).await?;
            Ok(None)
        }
    }
}

async fn handle_stale(ctx: &AuthContext, session: &Session) -> Result<()> {
    match ctx.stale_policy {
        StaleSessionPolicy::Ignore => Ok(()),
        StaleSessionPolicy::Regenerate => session.regenerate().await,
    }
}

/// Sign in: regenerate the session, then record the authenticated item.
///
/// # Errors
/// Returns `Error::Store` if regeneration fails; the identity is not written.
pub async fn start_authed_session(session: &Session, list_key: &str, item_id: &str) -> Result<()> {
    session.regenerate().await?;
    session.set_identity(list_key, item_id).await;
    info!(list_key, "Authenticated session started");
    Ok(())
}

/// Sign out: regenerate the session, dropping the identity.
///
/// # Errors
/// Returns `Error::Store` if regeneration fails.
pub async fn end_authed_session(session: &Session) -> Result<bool> {
    session.regenerate().await?;
    info!("Authenticated session ended");
    Ok(true)
}
