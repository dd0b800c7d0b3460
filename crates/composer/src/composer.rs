//! One message box that submits human turns to the engine.
//!
//! A submission runs in two halves. [`Composer::begin`] plans the parent,
//! raises the pending flag and takes the input text; [`Composer::finish`]
//! commits the engine's records into the [`Simulation`] or, on failure,
//! restores the text. [`Composer::submit`] drives both around an engine call.
//! While pending, only a [`PendingTurn`] placeholder exists; it is never a
//! [`TurnRecord`](turntree_core::TurnRecord) and never reaches the tree.

use crate::engine::{EngineError, EngineReply, TurnEngine, TurnRequest};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};
use turntree_core::{
    ForkAnchor, ForkError, Simulation, SimulationError, SubmissionKind, SubmissionPlan,
};
use turntree_runtime_config::ComposerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComposerSettings {
    /// `None` waits for the engine indefinitely.
    pub submit_timeout: Option<Duration>,
}

impl From<&ComposerConfig> for ComposerSettings {
    fn from(config: &ComposerConfig) -> Self {
        Self {
            submit_timeout: (config.submit_timeout_secs > 0)
                .then(|| Duration::from_secs(config.submit_timeout_secs)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ComposerError {
    #[error("a submission is already in flight")]
    AlreadyPending,
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Plan(#[from] ForkError),
    #[error("submission failed: {0}")]
    Engine(#[from] EngineError),
    #[error("engine broke the turn contract: {0}")]
    EngineContract(String),
    #[error(transparent)]
    Rejected(#[from] SimulationError),
}

/// Optimistic stand-in shown while the engine works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub parent_node_id: Option<String>,
    pub text: String,
    pub kind: SubmissionKind,
    pub started_at: DateTime<Utc>,
}

/// Proof that [`Composer::begin`] succeeded; consumed by `finish`.
#[derive(Debug)]
#[must_use = "a started submission must be finished"]
pub struct SubmissionTicket {
    plan: SubmissionPlan,
    message: String,
}

impl SubmissionTicket {
    pub fn plan(&self) -> &SubmissionPlan {
        &self.plan
    }

    pub fn request(&self) -> TurnRequest {
        TurnRequest {
            parent_node_id: self.plan.parent_node_id.clone(),
            message: self.message.trim().to_string(),
            turn_number: self.plan.turn_number,
        }
    }
}

#[derive(Debug, Default)]
pub struct Composer {
    input: String,
    anchor: Option<ForkAnchor>,
    pending: Option<PendingTurn>,
    settings: ComposerSettings,
}

impl Composer {
    pub fn new(settings: ComposerSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn anchor(&self) -> Option<&ForkAnchor> {
        self.anchor.as_ref()
    }

    /// Mark a human turn as the place to try a different reply.
    pub fn set_anchor(&mut self, sim: &Simulation, node_id: &str) -> Result<(), ForkError> {
        self.anchor = Some(ForkAnchor::new(sim.tree(), node_id)?);
        Ok(())
    }

    pub fn cancel_anchor(&mut self) {
        self.anchor = None;
    }

    pub fn pending(&self) -> Option<&PendingTurn> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Plan the submission and mark it in flight.
    ///
    /// A stale anchor is cleared and reported without touching anything else.
    pub fn begin(&mut self, sim: &Simulation) -> Result<SubmissionTicket, ComposerError> {
        if self.pending.is_some() {
            return Err(ComposerError::AlreadyPending);
        }
        if self.input.trim().is_empty() {
            return Err(ComposerError::EmptyMessage);
        }

        let plan = match sim.plan_submission(self.anchor.as_ref()) {
            Ok(plan) => plan,
            Err(e @ ForkError::StaleAnchor { .. }) => {
                self.anchor = None;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let message = std::mem::take(&mut self.input);
        self.pending = Some(PendingTurn {
            parent_node_id: plan.parent_node_id.clone(),
            text: message.trim().to_string(),
            kind: plan.kind.clone(),
            started_at: Utc::now(),
        });
        Ok(SubmissionTicket { plan, message })
    }

    /// Settle a submission. Success commits the records and clears a fork
    /// anchor; any failure restores the input and keeps the anchor.
    pub fn finish(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<EngineReply, EngineError>,
        sim: &mut Simulation,
    ) -> Result<EngineReply, ComposerError> {
        self.pending = None;
        let SubmissionTicket { plan, message } = ticket;

        let result = outcome
            .map_err(ComposerError::from)
            .and_then(|reply| check_contract(&plan, reply))
            .and_then(|reply| {
                sim.ingest(reply.records())?;
                Ok(reply)
            });

        match result {
            Ok(reply) => {
                if plan.is_fork() {
                    self.anchor = None;
                }
                info!(
                    node_id = %reply.human.node_id,
                    parent = ?plan.parent_node_id,
                    fork = plan.is_fork(),
                    "turn submitted"
                );
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "submission failed, input restored");
                self.input = message;
                Err(e)
            }
        }
    }

    /// Run a whole submission against `engine`.
    pub async fn submit<E: TurnEngine>(
        &mut self,
        engine: &E,
        sim: &mut Simulation,
    ) -> Result<EngineReply, ComposerError> {
        let ticket = self.begin(sim)?;
        let request = ticket.request();

        let call = async {
            match &ticket.plan().kind {
                SubmissionKind::Continuation => engine.submit_continuation(&request).await,
                SubmissionKind::Fork { anchor_node_id } => {
                    engine.submit_fork(anchor_node_id, &request).await
                }
            }
        };
        let outcome = match self.settings.submit_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(EngineError::Timeout(limit))),
            None => call.await,
        };

        self.finish(ticket, outcome, sim)
    }
}

fn check_contract(plan: &SubmissionPlan, reply: EngineReply) -> Result<EngineReply, ComposerError> {
    if reply.human.parent_node_id != plan.parent_node_id {
        return Err(ComposerError::EngineContract(format!(
            "human turn {} has parent {:?}, expected {:?}",
            reply.human.node_id, reply.human.parent_node_id, plan.parent_node_id
        )));
    }
    if !reply.human.is_human() {
        return Err(ComposerError::EngineContract(format!(
            "turn {} is not a human turn",
            reply.human.node_id
        )));
    }
    if let Some(agent) = &reply.agent {
        if agent.parent_node_id.as_deref() != Some(reply.human.node_id.as_str()) {
            return Err(ComposerError::EngineContract(format!(
                "agent turn {} does not follow human turn {}",
                agent.node_id, reply.human.node_id
            )));
        }
    }
    Ok(reply)
}
