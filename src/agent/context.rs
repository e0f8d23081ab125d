use super::api::{Message, User};
use super::llm::ChatTurn;
use super::sanitize::sanitize;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Upper bound on conversation turns handed to the completion backend.
pub const CONTEXT_WINDOW: usize = 10;

static LEADING_MENTIONS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:@[\w\-\.]+\s*)+").unwrap());

/// Drop the leading run of `@name` tokens; they carried the trigger and add
/// nothing to the prompt.
pub fn strip_leading_mentions(content: &str) -> String {
    LEADING_MENTIONS_RE.replace(content, "").trim().to_string()
}

/// Build the role-tagged context window for one completion call: the last
/// [`CONTEXT_WINDOW`] messages in chronological order, each cleaned of
/// channel framing and leading mention tokens.
///
/// A flat turn sequence loses speaker identity in a multi-party room, so
/// every non-agent turn is prefixed with `<Name: ...>`, and only the
/// triggering message gets the `[asking you]` marker so the model can tell
/// the addressee from incidental chatter.
pub fn build_context(
    messages: &[Message],
    users: &[User],
    trigger: &Message,
    agent_user_id: &str,
) -> Vec<ChatTurn> {
    let names: HashMap<&str, &str> = users
        .iter()
        .map(|user| (user.id.as_str(), user.name.as_str()))
        .collect();

    let start = messages.len().saturating_sub(CONTEXT_WINDOW);
    let mut turns = Vec::with_capacity(messages.len() - start);

    for message in &messages[start..] {
        let content = strip_leading_mentions(&sanitize(&message.content));

        if message.sender_id == agent_user_id {
            turns.push(ChatTurn::assistant(content));
            continue;
        }

        let name = names
            .get(message.sender_id.as_str())
            .copied()
            .unwrap_or("User");
        let formatted = if message.id == trigger.id {
            format!("<Name: {}> [asking you]: {}", name, content)
        } else {
            format!("<Name: {}>: {}", name, content)
        };
        turns.push(ChatTurn::user(formatted));
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, sender: &str, content: &str, timestamp: i64) -> Message {
        Message {
            id: id.to_string(),
            sender_id: sender.to_string(),
            content: content.to_string(),
            timestamp,
            conversation_id: "global".to_string(),
            mentions: Vec::new(),
        }
    }

    fn users() -> Vec<User> {
        vec![
            User {
                id: "u1".to_string(),
                name: "Ana".to_string(),
            },
            User {
                id: "llm1".to_string(),
                name: "Bot".to_string(),
            },
        ]
    }

    #[test]
    fn test_window_is_bounded_to_most_recent_messages() {
        let messages: Vec<Message> = (0..15)
            .map(|i| message(&format!("m{}", i), "u1", &format!("msg {}", i), i))
            .collect();
        let trigger = messages.last().unwrap().clone();

        let turns = build_context(&messages, &users(), &trigger, "llm1");

        assert_eq!(turns.len(), CONTEXT_WINDOW);
        // Chronological order preserved, oldest surviving message first.
        assert!(turns[0].content.ends_with("msg 5"));
        assert!(turns[9].content.contains("msg 14"));
    }

    #[test]
    fn test_trigger_annotation_is_unique_and_on_the_trigger() {
        let messages = vec![
            message("m1", "u1", "earlier question", 1),
            message("m2", "u1", "actual question", 2),
            message("m3", "u1", "later chatter", 3),
        ];
        let trigger = messages[1].clone();

        let turns = build_context(&messages, &users(), &trigger, "llm1");

        let asking: Vec<&ChatTurn> = turns
            .iter()
            .filter(|turn| turn.content.contains("[asking you]"))
            .collect();
        assert_eq!(asking.len(), 1);
        assert_eq!(asking[0].content, "<Name: Ana> [asking you]: actual question");
    }

    #[test]
    fn test_agent_messages_become_assistant_turns() {
        let messages = vec![
            message("m1", "u1", "@Bot hello", 1),
            message("m2", "llm1", "hi Ana", 2),
            message("m3", "u1", "@Bot follow-up", 3),
        ];
        let trigger = messages[2].clone();

        let turns = build_context(&messages, &users(), &trigger, "llm1");

        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[1].content, "hi Ana");
        assert_eq!(turns[2].role, "user");
    }

    #[test]
    fn test_unresolved_sender_falls_back_to_generic_name() {
        let messages = vec![message("m1", "ghost", "who am I", 1)];
        let trigger = messages[0].clone();

        let turns = build_context(&messages, &[], &trigger, "llm1");

        assert_eq!(turns[0].content, "<Name: User> [asking you]: who am I");
    }

    #[test]
    fn test_historic_agent_output_is_sanitized() {
        let messages = vec![
            message(
                "m1",
                "llm1",
                "<|channel|>final<|message|>clean answer<|end|>",
                1,
            ),
            message("m2", "u1", "@Bot next", 2),
        ];
        let trigger = messages[1].clone();

        let turns = build_context(&messages, &users(), &trigger, "llm1");

        assert_eq!(turns[0].content, "clean answer");
    }

    #[test]
    fn test_strip_leading_mentions() {
        assert_eq!(strip_leading_mentions("@Bot hello"), "hello");
        assert_eq!(strip_leading_mentions("@Bot @Ana hello"), "hello");
        assert_eq!(
            strip_leading_mentions("hello @Bot in the middle"),
            "hello @Bot in the middle"
        );
        assert_eq!(strip_leading_mentions("@bot.v2-beta hi"), "hi");
    }
}
