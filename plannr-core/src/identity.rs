//! Current-user identity resolution.
//!
//! The auth token only carries the user's email, but message attribution
//! needs the opaque user id. Strategies are tried in a fixed order and each
//! one is a pure function over the inputs it needs:
//!
//! 1. user search by email,
//! 2. a user id claim inside the token,
//! 3. the single participant common to every known conversation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use plannr_shared::{Conversation, TokenClaims, User};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentitySource {
    /// Id taken from the signed-in user's stored profile; no lookup needed.
    StoredProfile,
    UserSearch,
    Token,
    ConversationParticipants,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResolution {
    Resolved { id: String, source: IdentitySource },
    Unresolved,
}

impl IdentityResolution {
    pub fn id(&self) -> Option<&str> {
        match self {
            IdentityResolution::Resolved { id, .. } => Some(id),
            IdentityResolution::Unresolved => None,
        }
    }
}

/// Everything the chain may look at. Missing inputs skip their step.
#[derive(Debug, Default)]
pub struct IdentityInputs<'a> {
    pub email: Option<&'a str>,
    pub search_results: Option<&'a [User]>,
    pub claims: Option<&'a TokenClaims>,
    pub conversations: Option<&'a [Conversation]>,
}

/// Exact (case-insensitive) email match among search results.
pub fn from_search(email: &str, results: &[User]) -> Option<String> {
    let email = email.trim();
    results
        .iter()
        .find(|u| u.email.trim().eq_ignore_ascii_case(email))
        .map(|u| u.id.clone())
}

pub fn from_token(claims: &TokenClaims) -> Option<String> {
    claims
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// The participant present in every conversation, if there is exactly one.
/// A lone one-to-one chat is ambiguous and yields `None`.
pub fn from_participants(conversations: &[Conversation]) -> Option<String> {
    let mut iter = conversations.iter();
    let first = iter.next()?;
    let mut common: BTreeSet<&str> = first.participant_ids.iter().map(String::as_str).collect();

    for conv in iter {
        let ids: BTreeSet<&str> = conv.participant_ids.iter().map(String::as_str).collect();
        common = common.intersection(&ids).copied().collect();
        if common.is_empty() {
            return None;
        }
    }

    if common.len() == 1 {
        common.into_iter().next().map(str::to_string)
    } else {
        None
    }
}

/// Run the strategies in order; the first one that yields an id wins.
pub fn resolve(inputs: &IdentityInputs<'_>) -> IdentityResolution {
    if let (Some(email), Some(results)) = (inputs.email, inputs.search_results) {
        if let Some(id) = from_search(email, results) {
            return IdentityResolution::Resolved { id, source: IdentitySource::UserSearch };
        }
    }

    if let Some(id) = inputs.claims.and_then(from_token) {
        return IdentityResolution::Resolved { id, source: IdentitySource::Token };
    }

    if let Some(id) = inputs.conversations.and_then(from_participants) {
        return IdentityResolution::Resolved { id, source: IdentitySource::ConversationParticipants };
    }

    tracing::debug!("Current user id could not be resolved, falling back to email comparison");
    IdentityResolution::Unresolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str) -> User {
        User { id: id.into(), email: email.into(), name: None, role: None }
    }

    #[test]
    fn test_search_matches_email_case_insensitively() {
        let results = vec![user("u2", "bob@x.com"), user("u1", "Alice@X.com")];
        assert_eq!(from_search("alice@x.com", &results), Some("u1".to_string()));
        assert_eq!(from_search("carol@x.com", &results), None);
    }

    #[test]
    fn test_token_step_ignores_blank_ids() {
        let claims = TokenClaims { sub: "a@x.com".into(), user_id: Some(" ".into()), ..Default::default() };
        assert_eq!(from_token(&claims), None);
    }

    #[test]
    fn test_participants_need_a_unique_common_member() {
        let single = vec![Conversation::individual("c1", "me", "bob")];
        assert_eq!(from_participants(&single), None);

        let many = vec![
            Conversation::individual("c1", "me", "bob"),
            Conversation::individual("c2", "carol", "me"),
        ];
        assert_eq!(from_participants(&many), Some("me".to_string()));

        let disjoint = vec![
            Conversation::individual("c1", "me", "bob"),
            Conversation::individual("c2", "carol", "dan"),
        ];
        assert_eq!(from_participants(&disjoint), None);
        assert_eq!(from_participants(&[]), None);
    }

    #[test]
    fn test_chain_order() {
        let results = vec![user("from-search", "a@x.com")];
        let claims = TokenClaims { sub: "a@x.com".into(), user_id: Some("from-token".into()), ..Default::default() };
        let convs = vec![
            Conversation::individual("c1", "from-chats", "bob"),
            Conversation::individual("c2", "from-chats", "carol"),
        ];

        let all = IdentityInputs {
            email: Some("a@x.com"),
            search_results: Some(&results),
            claims: Some(&claims),
            conversations: Some(&convs),
        };
        assert_eq!(
            resolve(&all),
            IdentityResolution::Resolved { id: "from-search".into(), source: IdentitySource::UserSearch }
        );

        let no_search = IdentityInputs { search_results: Some(&[]), ..all };
        assert_eq!(resolve(&no_search).id(), Some("from-token"));

        let chats_only = IdentityInputs { conversations: Some(&convs), ..Default::default() };
        assert_eq!(resolve(&chats_only).id(), Some("from-chats"));

        assert_eq!(resolve(&IdentityInputs::default()), IdentityResolution::Unresolved);
    }
}
