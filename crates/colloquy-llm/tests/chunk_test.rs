use colloquy_llm::chunk::{ModelChunk, UsageEnvelope};

#[test]
fn thinking_chunk_carries_flag_and_signature() {
    let chunk = ModelChunk::thinking("reasoning...", "sig-1");
    assert!(chunk.is_thinking());
    assert_eq!(chunk.thinking_signature(), Some("sig-1"));
    assert_eq!(chunk.text.as_deref(), Some("reasoning..."));
}

#[test]
fn plain_text_chunk_is_not_thinking() {
    let chunk = ModelChunk::text_fragment("hello");
    assert!(!chunk.is_thinking());
    assert_eq!(chunk.thinking_signature(), None);
}

#[test]
fn usage_overlay_replaces_reported_counts_only() {
    let mut usage = UsageEnvelope {
        prompt_tokens: 100,
        completion_tokens: 0,
        thinking_tokens: None,
        cache_creation_tokens: Some(7),
        cache_read_tokens: None,
    };

    usage.overlay(&UsageEnvelope {
        prompt_tokens: 0,
        completion_tokens: 42,
        thinking_tokens: None,
        cache_creation_tokens: None,
        cache_read_tokens: Some(30),
    });

    assert_eq!(usage.prompt_tokens, 100);
    assert_eq!(usage.completion_tokens, 42);
    assert_eq!(usage.cache_creation_tokens, Some(7));
    assert_eq!(usage.cache_read_tokens, Some(30));
    assert_eq!(usage.total_tokens(), 142);
}

#[test]
fn chunk_round_trips_through_serde() {
    let chunk = ModelChunk {
        usage: Some(UsageEnvelope::new(10, 5)),
        model: Some("claude-sonnet-4".to_string()),
        finish_reason: Some("end_turn".to_string()),
        ..Default::default()
    };

    let json = serde_json::to_string(&chunk).unwrap();
    let back: ModelChunk = serde_json::from_str(&json).unwrap();
    assert_eq!(back.finish_reason.as_deref(), Some("end_turn"));
    assert_eq!(back.usage.unwrap().prompt_tokens, 10);
    assert_eq!(back.role, "assistant");
}
