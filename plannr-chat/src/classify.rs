use serde::Serialize;
use plannr_shared::ChatMessage;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authorship {
    SelfAuthored,
    Other,
}

/// Ids are opaque and compared exactly.
fn same_id(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

fn same_email(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.trim().is_empty() && a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

/// Decide whether `message` was written by the current user. Rules, first
/// match wins:
///
/// 1. `senderId == currentUserId`
/// 2. `senderEmail == currentUserEmail`
/// 3. `senderId == currentUserEmail`, for senders whose id field carries an email
///
/// No match means `Other`.
pub fn classify_message(
    message: &ChatMessage,
    current_user_id: Option<&str>,
    current_user_email: Option<&str>,
) -> Authorship {
    let authored = is_self_authored(
        message.sender_id.as_deref(),
        message.sender_email.as_deref(),
        current_user_id,
        current_user_email,
    );
    if authored {
        Authorship::SelfAuthored
    } else {
        Authorship::Other
    }
}

pub(crate) fn is_self_authored(
    sender_id: Option<&str>,
    sender_email: Option<&str>,
    current_user_id: Option<&str>,
    current_user_email: Option<&str>,
) -> bool {
    same_id(sender_id, current_user_id)
        || same_email(sender_email, current_user_email)
        || same_email(sender_id, current_user_email)
}
