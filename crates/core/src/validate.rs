use crate::record::TurnRecord;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
    #[error("turn {node_id} has no utterance")]
    NoUtterance { node_id: String },
    #[error("turn {node_id} carries both a human and an agent utterance")]
    BothUtterances { node_id: String },
    #[error("turn {node_id} names itself as parent")]
    SelfParent { node_id: String },
    #[error("duplicate node_id: {node_id}")]
    DuplicateNodeId { node_id: String },
    #[error("invalid record at index {index}: {source}")]
    InvalidRecord {
        index: usize,
        source: Box<ValidationError>,
    },
}

/// Validate a batch of records by composing independent validators.
pub fn validate_records(records: &[TurnRecord]) -> Result<(), Vec<ValidationError>> {
    let validators: &[fn(&[TurnRecord]) -> Vec<ValidationError>] =
        &[validate_each, validate_unique_ids];

    let errors: Vec<ValidationError> = validators.iter().flat_map(|v| v(records)).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate records that are about to join an existing collection. Ids must
/// not collide with `existing` nor with each other.
pub fn validate_batch(
    existing: &[TurnRecord],
    incoming: &[TurnRecord],
) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_each(incoming);
    let mut seen: HashSet<&str> = existing.iter().map(|r| r.node_id.as_str()).collect();
    for record in incoming {
        if !seen.insert(record.node_id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: record.node_id.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_each(records: &[TurnRecord]) -> Vec<ValidationError> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            validate_record(record)
                .err()
                .map(|e| ValidationError::InvalidRecord {
                    index,
                    source: Box::new(e),
                })
        })
        .collect()
}

fn validate_unique_ids(records: &[TurnRecord]) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| !seen.insert(record.node_id.as_str()))
        .map(|record| ValidationError::DuplicateNodeId {
            node_id: record.node_id.clone(),
        })
        .collect()
}

/// Validate a single record's shape.
pub fn validate_record(record: &TurnRecord) -> Result<(), ValidationError> {
    if record.node_id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "node_id".to_string(),
        });
    }

    match (&record.user_message, &record.agent_message) {
        (None, None) => {
            return Err(ValidationError::NoUtterance {
                node_id: record.node_id.clone(),
            });
        }
        (Some(_), Some(_)) => {
            return Err(ValidationError::BothUtterances {
                node_id: record.node_id.clone(),
            });
        }
        _ => {}
    }

    if record.parent_node_id.as_deref() == Some(record.node_id.as_str()) {
        return Err(ValidationError::SelfParent {
            node_id: record.node_id.clone(),
        });
    }

    Ok(())
}
