use chrono::Utc;

use colloquy_llm::UsageEnvelope;
use colloquy_persist::TokenUsageRecord;

/// Sums token counts across all loop iterations of one turn.
///
/// Prompt and completion counts are the only required fields of an
/// iteration's envelope; thinking and cache counts are absorbed when the
/// provider reports them and contribute zero otherwise.
#[derive(Debug)]
pub struct TurnUsage {
    model: String,
    prompt_tokens: u64,
    completion_tokens: u64,
    thinking_tokens: u64,
    cache_creation_tokens: u64,
    cache_read_tokens: u64,
    consumed: bool,
}

impl TurnUsage {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
            thinking_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            consumed: false,
        }
    }

    pub fn absorb(&mut self, usage: Option<&UsageEnvelope>) {
        let Some(usage) = usage else {
            return;
        };

        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.thinking_tokens += usage.thinking_tokens.unwrap_or(0);
        self.cache_creation_tokens += usage.cache_creation_tokens.unwrap_or(0);
        self.cache_read_tokens += usage.cache_read_tokens.unwrap_or(0);

        self.consumed |= usage.prompt_tokens > 0
            || usage.completion_tokens > 0
            || usage.thinking_tokens.unwrap_or(0) > 0
            || usage.cache_creation_tokens.unwrap_or(0) > 0
            || usage.cache_read_tokens.unwrap_or(0) > 0;
    }

    /// One summary row for the turn, or `None` when no tokens were consumed
    /// (no vacuous records).
    pub fn into_record(self, thread_id: &str, turn_number: i64) -> Option<TokenUsageRecord> {
        if !self.consumed {
            return None;
        }

        Some(TokenUsageRecord {
            thread_id: thread_id.to_string(),
            turn_number,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            thinking_tokens: self.thinking_tokens,
            cache_creation_tokens: self.cache_creation_tokens,
            cache_read_tokens: self.cache_read_tokens,
            model: self.model,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_across_iterations() {
        let mut usage = TurnUsage::new("claude-sonnet-4");
        usage.absorb(Some(&UsageEnvelope::new(100, 20)));
        usage.absorb(Some(&UsageEnvelope {
            prompt_tokens: 150,
            completion_tokens: 30,
            thinking_tokens: Some(12),
            cache_creation_tokens: None,
            cache_read_tokens: Some(90),
        }));
        usage.absorb(None);

        let record = usage.into_record("thread-1", 4).unwrap();
        assert_eq!(record.prompt_tokens, 250);
        assert_eq!(record.completion_tokens, 50);
        assert_eq!(record.thinking_tokens, 12);
        assert_eq!(record.cache_read_tokens, 90);
        assert_eq!(record.turn_number, 4);
        assert_eq!(record.model, "claude-sonnet-4");
    }

    #[test]
    fn no_tokens_means_no_record() {
        let usage = TurnUsage::new("claude-sonnet-4");
        assert!(usage.into_record("thread-1", 1).is_none());

        let mut zeroed = TurnUsage::new("claude-sonnet-4");
        zeroed.absorb(Some(&UsageEnvelope::default()));
        assert!(zeroed.into_record("thread-1", 1).is_none());
    }
}
