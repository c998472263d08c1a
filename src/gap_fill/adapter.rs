use super::{
    build_class_messages, build_messages, parse_suggestions, ClassBrief, GapFillContext,
    GapFillOutcome, GapFiller,
};
use crate::config::GapFillSettings;
use crate::llm::{Completion, CompletionOptions, LlmError, LlmProvider, Message};
use crate::planner::Slot;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_COMPLETION_TOKENS: u32 = 1200;
/// A whole class lists up to twenty tracks.
const MAX_CLASS_COMPLETION_TOKENS: u32 = 3000;

/// Gap-filler backed by a completion provider.
pub struct LlmGapFiller {
    provider: Arc<dyn LlmProvider>,
    settings: GapFillSettings,
}

impl LlmGapFiller {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GapFillSettings) -> Self {
        Self { provider, settings }
    }

    /// One completion attempt, bounded by the configured timeout.
    async fn attempt(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        match tokio::time::timeout(
            self.settings.timeout(),
            self.provider.complete(messages, options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout),
        }
    }

    /// Send `messages`, retrying transient failures, and parse at most `cap`
    /// stubs out of the reply. `what` labels the request in logs.
    async fn request(
        &self,
        messages: Vec<Message>,
        max_tokens: u32,
        cap: usize,
        what: &str,
    ) -> GapFillOutcome {
        let options = CompletionOptions {
            temperature: self.settings.temperature,
            max_tokens: Some(max_tokens),
            timeout: self.settings.timeout(),
            json_response: true,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(what, attempt, "Requesting suggestions");

            let error = match self.attempt(&messages, &options).await {
                Ok(completion) if completion.truncated => {
                    warn!(what, "Completion hit the token limit, discarding it");
                    return GapFillOutcome::Malformed("truncated completion".to_string());
                }
                Ok(completion) => {
                    return match parse_suggestions(&completion.content) {
                        Ok(stubs) if stubs.is_empty() => GapFillOutcome::Empty,
                        Ok(mut stubs) => {
                            stubs.truncate(cap);
                            GapFillOutcome::Suggestions(stubs)
                        }
                        Err(detail) => {
                            warn!(what, %detail, "Discarding malformed suggestion response");
                            GapFillOutcome::Malformed(detail)
                        }
                    };
                }
                Err(e) => e,
            };

            if error.is_transient() && attempt <= self.settings.max_retries {
                warn!(what, attempt, error = %error, "Suggestion request failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }

            warn!(what, attempt, error = %error, "Suggestion request failed");
            return match error {
                LlmError::InvalidResponse(detail) => GapFillOutcome::Malformed(detail),
                other => GapFillOutcome::ServiceError(other.to_string()),
            };
        }
    }
}

#[async_trait]
impl GapFiller for LlmGapFiller {
    fn source(&self) -> String {
        format!("{}:{}", self.provider.name(), self.provider.model())
    }

    async fn fill(&self, slot: &Slot, context: &GapFillContext) -> GapFillOutcome {
        let cap = self.settings.max_suggestions;
        let messages = build_messages(slot, context, cap);
        let what = format!("slot {} ({})", slot.ordinal, slot.role);
        self.request(messages, MAX_COMPLETION_TOKENS, cap, &what)
            .await
    }

    async fn recommend(&self, brief: &ClassBrief, context: &GapFillContext) -> GapFillOutcome {
        let messages = build_class_messages(brief, context);
        self.request(
            messages,
            MAX_CLASS_COMPLETION_TOKENS,
            brief.track_count,
            "class recommendation",
        )
        .await
    }
}
