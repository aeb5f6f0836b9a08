use async_trait::async_trait;

use colloquy_llm::ToolCallRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected { reason: String },
}

/// Pluggable review of a whole tool batch before execution.
///
/// Rejection is fatal for the turn; the loop stops without executing any
/// call from the batch.
#[async_trait]
pub trait ApprovalPolicy: Send + Sync {
    async fn review(&self, batch: &[ToolCallRequest]) -> ApprovalDecision;
}

/// Default policy: approves unconditionally.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalPolicy for AutoApprove {
    async fn review(&self, _batch: &[ToolCallRequest]) -> ApprovalDecision {
        ApprovalDecision::Approved
    }
}
