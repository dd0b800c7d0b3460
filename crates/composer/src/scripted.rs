//! Deterministic in-process engine for demos and tests.

use crate::engine::{EngineError, EngineReply, TurnEngine, TurnRequest};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use turntree_core::{TurnRecord, TurnStatus};
use turntree_runtime_config::EngineConfig;
use uuid::Uuid;

/// Answers every human turn with the next scripted line, or echoes the
/// message behind a prefix once the script runs out.
///
/// Timestamps strictly increase from `start`, so new turns always sort after
/// the ones they were created from.
pub struct ScriptedEngine {
    agent_name: String,
    reply_prefix: String,
    script: Mutex<VecDeque<String>>,
    next_ms: AtomicI64,
}

impl ScriptedEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            agent_name: config.agent_name.clone(),
            reply_prefix: config.reply_prefix.clone(),
            script: Mutex::new(VecDeque::new()),
            next_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Start the clock no earlier than one millisecond after `latest`.
    pub fn after(mut self, latest: Option<DateTime<Utc>>) -> Self {
        if let Some(latest) = latest {
            let floor = latest.timestamp_millis() + 1;
            let current = *self.next_ms.get_mut();
            *self.next_ms.get_mut() = current.max(floor);
        }
        self
    }

    /// Start the clock exactly at `start`.
    pub fn starting_at(self, start: DateTime<Utc>) -> Self {
        self.next_ms
            .store(start.timestamp_millis(), Ordering::SeqCst);
        self
    }

    /// Queue agent replies, used in order.
    pub fn with_script<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut script) = self.script.lock() {
            script.extend(lines.into_iter().map(Into::into));
        }
        self
    }

    fn tick(&self) -> DateTime<Utc> {
        let ms = self.next_ms.fetch_add(1, Ordering::SeqCst);
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
    }

    fn next_reply(&self, message: &str) -> Result<String, EngineError> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| EngineError::Unavailable("script lock poisoned".to_string()))?;
        Ok(script
            .pop_front()
            .unwrap_or_else(|| format!("{}{}", self.reply_prefix, message)))
    }

    fn run(&self, request: &TurnRequest, mode: &str) -> Result<EngineReply, EngineError> {
        if request.message.trim().is_empty() {
            return Err(EngineError::Rejected("empty message".to_string()));
        }

        let mut human = TurnRecord::human(
            Uuid::new_v4().to_string(),
            request.parent_node_id.clone(),
            self.tick(),
            request.message.clone(),
        );
        human.turn_number = request.turn_number;

        let reply = self.next_reply(&request.message)?;
        let mut agent = TurnRecord::agent(
            Uuid::new_v4().to_string(),
            Some(human.node_id.clone()),
            self.tick(),
            reply,
        );
        agent.turn_number = request.turn_number.saturating_add(1);
        agent.status = TurnStatus::Valid;
        agent.diagnostics = serde_json::json!({
            "engine": "scripted",
            "agent": self.agent_name,
            "mode": mode,
        });

        Ok(EngineReply {
            human,
            agent: Some(agent),
        })
    }
}

impl TurnEngine for ScriptedEngine {
    async fn submit_continuation(&self, request: &TurnRequest) -> Result<EngineReply, EngineError> {
        self.run(request, "continuation")
    }

    async fn submit_fork(
        &self,
        _anchor_node_id: &str,
        request: &TurnRequest,
    ) -> Result<EngineReply, EngineError> {
        self.run(request, "fork")
    }
}
