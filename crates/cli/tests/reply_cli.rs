use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const GREETING: &str = r#"{"node_id":"n1","timestamp":"2026-01-01T00:00:01Z","user_message":"hi"}
{"node_id":"n2","parent_node_id":"n1","timestamp":"2026-01-01T00:00:02Z","agent_message":"hello"}
{"node_id":"n3","parent_node_id":"n2","timestamp":"2026-01-01T00:00:03Z","user_message":"ok"}
{"node_id":"n4","parent_node_id":"n3","timestamp":"2026-01-01T00:00:04Z","agent_message":"bye"}
"#;

fn write_greeting(root: &Path) -> PathBuf {
    let path = root.join("turns.jsonl");
    fs::write(&path, GREETING).expect("write fixture");
    path
}

fn turntree(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_turntree"));
    cmd.env("HOME", home)
        .env_remove("TURNTREE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn parse_json_output(output: &Output) -> Value {
    if !output.status.success() {
        panic!(
            "command failed\nstatus: {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    serde_json::from_slice(&output.stdout).expect("json output")
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path)
        .expect("read records")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .count()
}

#[test]
fn reply_continues_from_latest_leaf() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write_greeting(temp.path());

    let output = turntree(temp.path())
        .args(["reply", "--format", "json", "--message", "tell me more"])
        .arg(&file)
        .output()
        .expect("run reply");
    let json = parse_json_output(&output);

    let turns = json["data"]["turns"].as_array().expect("turns");
    assert_eq!(json["data"]["fork"], false);
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["speaker"], "human");
    assert_eq!(turns[0]["parent_node_id"], "n4");
    assert_eq!(turns[0]["text"], "tell me more");
    assert_eq!(turns[1]["speaker"], "agent");
    assert_eq!(turns[1]["parent_node_id"], turns[0]["node_id"]);
    assert_eq!(turns[1]["text"], "ack: tell me more");
    assert_eq!(line_count(&file), 6);
}

#[test]
fn reply_with_anchor_forks_at_anchor_parent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write_greeting(temp.path());

    let output = turntree(temp.path())
        .args(["reply", "--format", "json", "--anchor", "n3", "-m", "not ok"])
        .arg(&file)
        .output()
        .expect("run reply");
    let json = parse_json_output(&output);
    assert_eq!(json["data"]["fork"], true);
    assert_eq!(json["data"]["turns"][0]["parent_node_id"], "n2");
    assert_eq!(json["data"]["turns"][0]["branch"], "b1");

    let output = turntree(temp.path())
        .args(["branches", "--format", "json"])
        .arg(&file)
        .output()
        .expect("run branches");
    let json = parse_json_output(&output);
    let branches = json["data"].as_array().expect("branches");
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[1]["forked_from"], "n2");
}

#[test]
fn reply_with_selection_continues_that_branch() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write_greeting(temp.path());

    let fork = parse_json_output(
        &turntree(temp.path())
            .args(["reply", "--format", "json", "--anchor", "n3", "-m", "other"])
            .arg(&file)
            .output()
            .expect("run fork"),
    );
    let fork_agent = fork["data"]["turns"][1]["node_id"]
        .as_str()
        .expect("agent id")
        .to_string();

    let json = parse_json_output(
        &turntree(temp.path())
            .args(["reply", "--format", "json", "--select", &fork_agent, "-m", "and then?"])
            .arg(&file)
            .output()
            .expect("run reply"),
    );
    assert_eq!(json["data"]["turns"][0]["parent_node_id"], fork_agent.as_str());
    assert_eq!(line_count(&file), 8);
}

#[test]
fn anchor_on_agent_turn_is_refused_and_file_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write_greeting(temp.path());

    let output = turntree(temp.path())
        .args(["reply", "--anchor", "n2", "-m", "nope"])
        .arg(&file)
        .output()
        .expect("run reply");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("n2"));
    assert_eq!(fs::read_to_string(&file).expect("read"), GREETING);
}

#[test]
fn reply_to_missing_file_starts_a_root() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = temp.path().join("fresh.jsonl");

    let output = turntree(temp.path())
        .args(["reply", "-m", "hello there"])
        .arg(&file)
        .output()
        .expect("run reply");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("started a new root"));
    assert_eq!(line_count(&file), 2);
}

#[test]
fn config_file_drives_engine_and_folding() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write_greeting(temp.path());
    let config = temp.path().join("custom.toml");
    fs::write(
        &config,
        r#"
[collapse]
linear_run_threshold = 3
fold_head = 1
fold_tail = 1

[engine]
reply_prefix = "re: "
"#,
    )
    .expect("write config");

    let json = parse_json_output(
        &turntree(temp.path())
            .args(["config", "--format", "json", "--config"])
            .arg(&config)
            .output()
            .expect("run config"),
    );
    assert_eq!(json["data"]["config"]["collapse"]["linear_run_threshold"], 3);
    assert_eq!(json["data"]["config"]["composer"]["submit_timeout_secs"], 0);

    let json = parse_json_output(
        &turntree(temp.path())
            .args(["tree", "--format", "json"])
            .arg(&file)
            .env("TURNTREE_CONFIG", &config)
            .output()
            .expect("run tree"),
    );
    let rows = json["data"]["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["hidden"], 2);

    let json = parse_json_output(
        &turntree(temp.path())
            .args(["reply", "--format", "json", "-m", "x", "--config"])
            .arg(&config)
            .arg(&file)
            .output()
            .expect("run reply"),
    );
    assert_eq!(json["data"]["turns"][1]["text"], "re: x");
}

#[test]
fn missing_explicit_config_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = turntree(temp.path())
        .args(["config", "--config"])
        .arg(temp.path().join("absent.toml"))
        .output()
        .expect("run config");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config file not found"));
}
