use super::api::{Message, User};

/// Whether a message addresses this agent: either the structured mentions
/// list carries the agent's user id, or the content contains the literal
/// `@DisplayName` substring.
///
/// The substring check is case-sensitive and has no trailing word boundary,
/// so a longer name sharing the agent's name as a prefix also matches. Known
/// limitation, kept deliberately; tightening it changes observable behavior.
pub fn is_mentioned(message: &Message, users: &[User], agent_user_id: &str) -> bool {
    if message.mentions.iter().any(|id| id == agent_user_id) {
        return true;
    }

    users
        .iter()
        .find(|user| user.id == agent_user_id)
        .map(|user| {
            !user.name.is_empty() && message.content.contains(&format!("@{}", user.name))
        })
        .unwrap_or(false)
}
