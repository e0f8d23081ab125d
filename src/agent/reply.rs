use super::api::AgentConfig;
use super::llm::{ChatTurn, Completion, ModelParams};
use super::sanitize::sanitize;
use tracing::{debug, warn};

/// Persona used when the registry carries no system prompt for this agent.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a group chat. \
    Respond directly and concisely to the user's message. \
    Do NOT include any prefix like '[GPT-4]:' or your name in responses. \
    Be friendly and helpful. You may respond in the user's language.";

fn system_turn(agent_config: Option<&AgentConfig>) -> ChatTurn {
    let prompt = agent_config
        .and_then(|config| config.system_prompt.as_deref())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    ChatTurn::system(prompt)
}

fn model_params(agent_config: Option<&AgentConfig>) -> ModelParams {
    let defaults = ModelParams::default();
    match agent_config.and_then(|config| config.model.as_ref()) {
        Some(model) => ModelParams {
            model: model.name.clone().unwrap_or(defaults.model),
            temperature: model.temperature.unwrap_or(defaults.temperature),
            max_tokens: model.max_tokens.unwrap_or(defaults.max_tokens),
        },
        None => defaults,
    }
}

/// Ask the completion backend for a reply to the built context and sanitize
/// the result. A backend failure degrades to an apology carrying the error
/// text; the triggering user always gets a reply.
pub async fn generate_reply<C>(
    llm: &C,
    agent_config: Option<&AgentConfig>,
    context: Vec<ChatTurn>,
) -> String
where
    C: Completion + ?Sized,
{
    let mut turns = vec![system_turn(agent_config)];
    turns.extend(context);

    let params = model_params(agent_config);
    debug!(
        model = %params.model,
        temperature = params.temperature,
        max_tokens = params.max_tokens,
        "generating reply from {} turns",
        turns.len()
    );
    for (index, turn) in turns.iter().enumerate() {
        debug!("prompt[{}] {}: {}", index, turn.role, turn.content);
    }

    match llm.complete(&turns, &params).await {
        Ok(raw) => {
            debug!(raw_length = raw.len(), "completion received");
            sanitize(&raw)
        }
        Err(err) => {
            warn!(?err, "completion failed, sending fallback reply");
            format!("Sorry, I ran into a problem: {}", err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::api::ModelConfig;
    use crate::agent::error::{AgentError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the request it was given and plays back a canned result.
    struct StubCompletion {
        response: Result<String>,
        seen_turns: Mutex<Vec<ChatTurn>>,
        seen_params: Mutex<Option<ModelParams>>,
    }

    impl StubCompletion {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                seen_turns: Mutex::new(Vec::new()),
                seen_params: Mutex::new(None),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(AgentError::Llm(message.to_string())),
                seen_turns: Mutex::new(Vec::new()),
                seen_params: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Completion for StubCompletion {
        async fn complete(&self, turns: &[ChatTurn], params: &ModelParams) -> Result<String> {
            *self.seen_turns.lock().unwrap() = turns.to_vec();
            *self.seen_params.lock().unwrap() = Some(params.clone());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(AgentError::Llm(message)) => Err(AgentError::Llm(message.clone())),
                Err(_) => unreachable!("stub only carries Llm errors"),
            }
        }
    }

    fn configured_agent() -> AgentConfig {
        AgentConfig {
            id: "helper-agent-1".to_string(),
            name: "Bot".to_string(),
            system_prompt: Some("Answer in haiku.".to_string()),
            model: Some(ModelConfig {
                provider: "parallax".to_string(),
                name: Some("qwen".to_string()),
                temperature: Some(0.2),
                max_tokens: Some(256),
            }),
            runtime: None,
        }
    }

    #[tokio::test]
    async fn test_reply_is_sanitized() {
        let stub = StubCompletion::ok(
            "<|channel|>analysis<|message|>mulling<|end|><|channel|>final<|message|>Hello<|end|>",
        );

        let reply = generate_reply(&stub, None, vec![ChatTurn::user("hi")]).await;

        assert_eq!(reply, "Hello");
    }

    #[tokio::test]
    async fn test_system_turn_precedes_context() {
        let stub = StubCompletion::ok("ok");

        generate_reply(&stub, None, vec![ChatTurn::user("hi")]).await;

        let turns = stub.seen_turns.lock().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "system");
        assert!(turns[0].content.contains("group chat"));
        assert_eq!(turns[1].role, "user");
    }

    #[tokio::test]
    async fn test_configured_prompt_and_params_are_used() {
        let stub = StubCompletion::ok("ok");
        let agent = configured_agent();

        generate_reply(&stub, Some(&agent), vec![ChatTurn::user("hi")]).await;

        let turns = stub.seen_turns.lock().unwrap();
        assert_eq!(turns[0].content, "Answer in haiku.");
        let params = stub.seen_params.lock().unwrap().clone().unwrap();
        assert_eq!(params.model, "qwen");
        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.max_tokens, 256);
    }

    #[tokio::test]
    async fn test_missing_model_descriptor_falls_back_to_defaults() {
        let stub = StubCompletion::ok("ok");
        let mut agent = configured_agent();
        agent.model = None;

        generate_reply(&stub, Some(&agent), vec![ChatTurn::user("hi")]).await;

        let params = stub.seen_params.lock().unwrap().clone().unwrap();
        assert_eq!(params, ModelParams::default());
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_apology() {
        let stub = StubCompletion::failing("connection refused");

        let reply = generate_reply(&stub, None, vec![ChatTurn::user("hi")]).await;

        assert!(reply.starts_with("Sorry, I ran into a problem:"));
        assert!(reply.contains("connection refused"));
    }
}
