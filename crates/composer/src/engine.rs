use std::future::Future;
use std::time::Duration;
use turntree_core::TurnRecord;

/// What the engine needs to run one human turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    /// Parent the new human turn must carry.
    pub parent_node_id: Option<String>,
    pub message: String,
    pub turn_number: u32,
}

/// Records produced by one submission: the human turn and, when the engine
/// answered, the agent turn that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineReply {
    pub human: TurnRecord,
    pub agent: Option<TurnRecord>,
}

impl EngineReply {
    pub fn records(&self) -> Vec<TurnRecord> {
        let mut out = vec![self.human.clone()];
        out.extend(self.agent.clone());
        out
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine rejected the turn: {0}")]
    Rejected(String),
    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),
}

/// The external execution engine that turns a human message into records.
///
/// Both calls are fallible and may take arbitrarily long. The engine is
/// trusted to set `parent_node_id` on the human turn from the request and to
/// parent its agent reply on that human turn.
pub trait TurnEngine: Send + Sync {
    fn submit_continuation(
        &self,
        request: &TurnRequest,
    ) -> impl Future<Output = Result<EngineReply, EngineError>> + Send;

    fn submit_fork(
        &self,
        anchor_node_id: &str,
        request: &TurnRequest,
    ) -> impl Future<Output = Result<EngineReply, EngineError>> + Send;
}
