use crate::record::TurnRecord;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Fixed base instant plus `secs`, so fixtures order deterministically.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
        + Duration::seconds(secs)
}

/// Human turn at `at(secs)`.
pub fn human(id: &str, parent: Option<&str>, secs: i64, text: &str) -> TurnRecord {
    TurnRecord::human(id, parent.map(str::to_string), at(secs), text)
}

/// Agent turn at `at(secs)`.
pub fn agent(id: &str, parent: Option<&str>, secs: i64, text: &str) -> TurnRecord {
    TurnRecord::agent(id, parent.map(str::to_string), at(secs), text)
}

/// Alternating human/agent chain `n1 -> n2 -> ... -> n{len}` rooted at `n1`.
pub fn chain(len: usize) -> Vec<TurnRecord> {
    chain_from("n", None, 0, len)
}

/// Alternating chain with ids `{prefix}{k}` hanging off `parent`, starting at
/// `start_secs`. The first turn is human.
pub fn chain_from(
    prefix: &str,
    parent: Option<&str>,
    start_secs: i64,
    len: usize,
) -> Vec<TurnRecord> {
    let mut out = Vec::with_capacity(len);
    let mut prev = parent.map(str::to_string);
    for k in 1..=len {
        let id = format!("{prefix}{k}");
        let secs = start_secs + k as i64;
        let mut record = if k % 2 == 1 {
            human(&id, prev.as_deref(), secs, &format!("human {k}"))
        } else {
            agent(&id, prev.as_deref(), secs, &format!("agent {k}"))
        };
        record.turn_number = k as u32;
        prev = Some(id);
        out.push(record);
    }
    out
}

/// Four-turn chain `n1(hi) -> n2(hello) -> n3(ok) -> n4(bye)`.
pub fn greeting_chain() -> Vec<TurnRecord> {
    vec![
        human("n1", None, 1, "hi"),
        agent("n2", Some("n1"), 2, "hello"),
        human("n3", Some("n2"), 3, "ok"),
        agent("n4", Some("n3"), 4, "bye"),
    ]
}
