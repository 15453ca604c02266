use tracing::{debug, warn};
use plannr_core::identity::{self, IdentityInputs, IdentityResolution, IdentitySource};
use plannr_core::repository::UserDirectory;
use plannr_shared::{Conversation, TokenClaims, User};

use crate::classify::is_self_authored;

/// The signed-in user as the synchronizer knows them. The email always comes
/// from the session; the id may have to be resolved lazily.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    email: Option<String>,
    resolution: Option<IdentityResolution>,
    /// Conversation count and claim presence seen by the last unresolved run.
    attempted: Option<(usize, bool)>,
}

impl CurrentUser {
    /// Profile stored at sign-in already carries the id.
    pub fn from_user(user: &User) -> Self {
        let resolution = if user.id.trim().is_empty() {
            None
        } else {
            Some(IdentityResolution::Resolved {
                id: user.id.clone(),
                source: IdentitySource::StoredProfile,
            })
        };
        Self { email: Some(user.email.clone()), resolution, attempted: None }
    }

    pub fn from_email(email: impl Into<String>) -> Self {
        Self { email: Some(email.into()), resolution: None, attempted: None }
    }

    pub fn id(&self) -> Option<&str> {
        self.resolution.as_ref().and_then(IdentityResolution::id)
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn source(&self) -> Option<IdentitySource> {
        match &self.resolution {
            Some(IdentityResolution::Resolved { source, .. }) => Some(*source),
            _ => None,
        }
    }

    /// Id if known, otherwise the email. Used as the key for listing calls.
    pub fn key(&self) -> Option<&str> {
        self.id().or(self.email())
    }

    /// True once the chain has run, whatever its result.
    pub fn is_settled(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn authored(&self, sender_id: Option<&str>, sender_email: Option<&str>) -> bool {
        is_self_authored(sender_id, sender_email, self.id(), self.email())
    }

    /// Run the fallback chain unless an id is already known. An unresolved
    /// result is kept until more conversations or token claims show up.
    /// Search errors are logged and the chain moves on.
    pub async fn ensure_resolved(
        &mut self,
        directory: &dyn UserDirectory,
        claims: Option<&TokenClaims>,
        conversations: &[Conversation],
    ) -> Option<&str> {
        if self.id().is_some() {
            return self.id();
        }
        let seen = (conversations.len(), claims.is_some());
        if self.is_settled() && self.attempted == Some(seen) {
            return None;
        }

        let email = self.email.clone();
        let search_results = match email.as_deref() {
            Some(email) => match directory.search_users(email).await {
                Ok(users) => Some(users),
                Err(e) => {
                    warn!(error = %e, "User search failed during identity resolution");
                    None
                }
            },
            None => None,
        };

        let inputs = IdentityInputs {
            email: email.as_deref(),
            search_results: search_results.as_deref(),
            claims,
            conversations: if conversations.is_empty() { None } else { Some(conversations) },
        };

        let resolution = identity::resolve(&inputs);
        if let IdentityResolution::Resolved { id, source } = &resolution {
            debug!(user_id = %id, source = ?source, "Resolved current user id");
        }
        self.resolution = Some(resolution);
        self.attempted = Some(seen);
        self.id()
    }
}
