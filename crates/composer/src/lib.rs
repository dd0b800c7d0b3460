pub mod composer;
pub mod engine;
pub mod scripted;

pub use composer::{Composer, ComposerError, ComposerSettings, PendingTurn, SubmissionTicket};
pub use engine::{EngineError, EngineReply, TurnEngine, TurnRequest};
pub use scripted::ScriptedEngine;
