use std::fmt::{self, Display};

/// The stage an agent turn is in.
///
/// A turn starts by awaiting a completion. A response with tool calls moves
/// it to `ExecutingTools` and back, a final answer or any error ends it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgentStage {
    #[default]
    AwaitingCompletion,
    ExecutingTools,
    Finished,
    Failed,
}

impl AgentStage {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStage::Finished | AgentStage::Failed)
    }

    /// Moves to `next`, tracing the transition.
    #[inline]
    pub fn advance(&mut self, next: AgentStage) {
        debug_assert!(!self.is_terminal(), "turn already ended at {self}");
        trace!("agent stage: {self} -> {next}");
        *self = next;
    }
}

impl Display for AgentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentStage::AwaitingCompletion => "awaiting completion",
            AgentStage::ExecutingTools => "executing tools",
            AgentStage::Finished => "finished",
            AgentStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
