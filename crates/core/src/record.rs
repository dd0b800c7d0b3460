use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single turn of the simulated conversation.
///
/// Records are immutable once created. Structure comes from `parent_node_id`
/// alone; `branch_id` and `turn_number` are display labels supplied by the
/// execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Unique turn identifier
    #[serde(alias = "nodeId")]
    pub node_id: String,
    /// Preceding turn, `None` for a root
    #[serde(default, alias = "parentNodeId")]
    pub parent_node_id: Option<String>,
    /// Display label of the branch this turn was created on
    #[serde(default, alias = "branchId")]
    pub branch_id: String,
    /// Display ordinal, never used for ordering
    #[serde(default, alias = "turnNumber")]
    pub turn_number: u32,
    /// Creation time, orders siblings
    pub timestamp: DateTime<Utc>,
    #[serde(
        default,
        alias = "userMessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_message: Option<String>,
    #[serde(
        default,
        alias = "agentMessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub agent_message: Option<String>,
    #[serde(default)]
    pub status: TurnStatus,
    /// Opaque engine payload (intent, confidence, decision, signals)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub diagnostics: serde_json::Value,
}

/// Externally computed health of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnStatus {
    #[default]
    #[serde(alias = "valid")]
    Valid,
    #[serde(alias = "drifted")]
    Drifted,
    #[serde(alias = "invalid")]
    Invalid,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Drifted => "DRIFTED",
            Self::Invalid => "INVALID",
        }
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Human,
    Agent,
}

impl TurnRecord {
    /// Human turn with no diagnostics.
    pub fn human(
        node_id: impl Into<String>,
        parent_node_id: Option<String>,
        timestamp: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            parent_node_id,
            branch_id: String::new(),
            turn_number: 0,
            timestamp,
            user_message: Some(text.into()),
            agent_message: None,
            status: TurnStatus::Valid,
            diagnostics: serde_json::Value::Null,
        }
    }

    /// Agent turn with no diagnostics.
    pub fn agent(
        node_id: impl Into<String>,
        parent_node_id: Option<String>,
        timestamp: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            parent_node_id,
            branch_id: String::new(),
            turn_number: 0,
            timestamp,
            user_message: None,
            agent_message: Some(text.into()),
            status: TurnStatus::Valid,
            diagnostics: serde_json::Value::Null,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_node_id.is_none()
    }

    /// Speaker inferred from which utterance is present. A record carrying
    /// only an agent utterance is an agent turn; anything else is treated as
    /// human so a malformed record still renders.
    pub fn speaker(&self) -> Speaker {
        if self.user_message.is_none() && self.agent_message.is_some() {
            Speaker::Agent
        } else {
            Speaker::Human
        }
    }

    pub fn is_human(&self) -> bool {
        self.speaker() == Speaker::Human
    }

    /// The utterance of this turn, whichever side produced it.
    pub fn text(&self) -> &str {
        self.user_message
            .as_deref()
            .or(self.agent_message.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn speaker_follows_present_utterance() {
        let human = TurnRecord::human("n1", None, ts(), "hi");
        let agent = TurnRecord::agent("n2", Some("n1".to_string()), ts(), "hello");

        assert_eq!(human.speaker(), Speaker::Human);
        assert!(human.is_root());
        assert_eq!(agent.speaker(), Speaker::Agent);
        assert!(!agent.is_root());
        assert_eq!(agent.text(), "hello");
    }

    #[test]
    fn deserializes_camel_case_engine_payload() {
        let raw = r#"{
            "nodeId": "n2",
            "parentNodeId": "n1",
            "branchId": "main",
            "turnNumber": 2,
            "timestamp": "2026-03-01T12:00:00Z",
            "agentMessage": "hello",
            "status": "DRIFTED",
            "diagnostics": {"intent": "greet", "confidence": 0.9}
        }"#;
        let record: TurnRecord = serde_json::from_str(raw).expect("parse record");

        assert_eq!(record.node_id, "n2");
        assert_eq!(record.parent_node_id.as_deref(), Some("n1"));
        assert_eq!(record.turn_number, 2);
        assert_eq!(record.status, TurnStatus::Drifted);
        assert_eq!(record.diagnostics["intent"], "greet");
        assert_eq!(record.speaker(), Speaker::Agent);
    }

    #[test]
    fn serializes_snake_case_and_skips_empty_fields() {
        let record = TurnRecord::human("n1", None, ts(), "hi");
        let encoded = serde_json::to_string(&record).expect("serialize");

        assert!(encoded.contains("\"node_id\":\"n1\""));
        assert!(encoded.contains("\"status\":\"VALID\""));
        assert!(!encoded.contains("agent_message"));
        assert!(!encoded.contains("diagnostics"));
    }

    #[test]
    fn missing_status_defaults_to_valid() {
        let raw = r#"{"node_id":"n1","timestamp":"2026-03-01T12:00:00Z","user_message":"hi"}"#;
        let record: TurnRecord = serde_json::from_str(raw).expect("parse record");
        assert_eq!(record.status, TurnStatus::Valid);
        assert!(record.parent_node_id.is_none());
    }
}
