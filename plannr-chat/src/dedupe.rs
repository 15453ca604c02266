use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use plannr_shared::{Conversation, ConversationKind};

/// Two or more individual conversations sharing one participant pair.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DuplicateFinding {
    pub pair_key: String,
    pub conversation_ids: Vec<String>,
}

/// Sorted, comma-joined participant pair: `pair_key("b", "a") == "a,b"`.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{},{}", a, b)
    } else {
        format!("{},{}", b, a)
    }
}

/// Pair key of an individual conversation between two distinct participants.
fn conversation_pair_key(conv: &Conversation) -> Option<String> {
    if conv.kind != ConversationKind::Individual {
        return None;
    }
    let distinct: BTreeSet<&str> = conv.participant_ids.iter().map(String::as_str).collect();
    if distinct.len() != 2 {
        return None;
    }
    let mut it = distinct.into_iter();
    Some(pair_key(it.next()?, it.next()?))
}

/// Report every pair key that maps to more than one distinct conversation id.
/// Findings are ordered by pair key; ids keep first-seen order.
pub fn detect_duplicates(conversations: &[Conversation]) -> Vec<DuplicateFinding> {
    let mut by_pair: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for conv in conversations {
        let Some(key) = conversation_pair_key(conv) else {
            continue;
        };
        let ids = by_pair.entry(key).or_default();
        if !ids.contains(&conv.id) {
            ids.push(conv.id.clone());
        }
    }

    by_pair
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(pair_key, conversation_ids)| DuplicateFinding { pair_key, conversation_ids })
        .collect()
}
