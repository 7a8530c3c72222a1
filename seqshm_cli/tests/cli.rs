//! End-to-end tests driving the `seqshm` binary

use seqshm::segment::{OpenMode, Segment};
use seqshm::{ShmError, naming};
use serde_json::Value;
use std::process::{Command, Output};

fn seqshm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_seqshm"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run seqshm")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn unique_id(tag: &str) -> String {
    format!("/test/cli/{}/{}", tag, std::process::id())
}

#[test]
fn test_written_value_outlives_writer_process() {
    let id = unique_id("persist");

    let write = seqshm(&["write", &id, "7", "--kind", "i32"]);
    assert!(write.status.success(), "write failed: {write:?}");

    let read = seqshm(&["read", &id, "--kind", "i32"]);
    assert!(read.status.success(), "read failed: {read:?}");
    assert_eq!(stdout(&read).trim(), "7");

    let overwrite = seqshm(&["write", &id, "-12", "--kind", "i32"]);
    assert!(overwrite.status.success());
    assert_eq!(stdout(&seqshm(&["read", &id, "--kind", "i32"])).trim(), "-12");

    Segment::unlink(&naming::resolve(&id)).unwrap();
}

#[test]
fn test_missing_stream_exits_with_errno() {
    let id = unique_id("missing");
    let read = seqshm(&["read", &id, "--kind", "u64"]);

    let enoent = ShmError::NotFound {
        name: String::new(),
    }
    .status_code();
    assert_eq!(read.status.code(), Some(enoent));
    assert!(stdout(&read).is_empty());
}

#[test]
fn test_invalid_value_is_rejected() {
    let id = unique_id("invalid");
    let write = seqshm(&["write", &id, "fast", "--kind", "f64"]);
    assert_eq!(write.status.code(), Some(1));
    assert!(Segment::open(&naming::resolve(&id), 64, OpenMode::Attach).is_err());
}

#[test]
fn test_list_json_then_cleanup_prefix() {
    let prefix = format!("seqshmcli{}", std::process::id());
    let ids = ["/robot/arm", "/gps/fix"];
    for id in ids {
        Segment::open(&naming::resolve_with_prefix(&prefix, id), 64, OpenMode::Create)
            .unwrap()
            .close();
    }

    let list = seqshm(&["list", "--prefix", &prefix, "--json"]);
    assert!(list.status.success(), "list failed: {list:?}");
    let segments: Value = serde_json::from_str(&stdout(&list)).unwrap();
    let segments = segments.as_array().unwrap();
    assert_eq!(segments.len(), ids.len());
    let arm = segments
        .iter()
        .find(|s| s["name"] == naming::resolve_with_prefix(&prefix, "/robot/arm"))
        .unwrap();
    assert_eq!(arm["id"], "robot_arm");
    assert_eq!(arm["size"], 64);
    assert_eq!(arm["hash"], naming::fnv1a_32(b"robot/arm"));

    let cleanup = seqshm(&["cleanup", "--prefix", &prefix]);
    assert!(cleanup.status.success(), "cleanup failed: {cleanup:?}");
    assert_eq!(stdout(&cleanup).trim(), "removed 2 segment(s)");

    let again = seqshm(&["cleanup", "--prefix", &prefix]);
    assert_eq!(stdout(&again).trim(), "removed 0 segment(s)");
    let relisted = seqshm(&["list", "--prefix", &prefix, "--json"]);
    let empty: Value = serde_json::from_str(&stdout(&relisted)).unwrap();
    assert_eq!(empty, Value::Array(Vec::new()));
}

#[test]
fn test_resolve_matches_library() {
    let resolve = seqshm(&["resolve", "/sensor/gps"]);
    assert!(resolve.status.success());
    assert_eq!(
        stdout(&resolve).trim(),
        format!("/sensor/gps -> {}", naming::resolve("/sensor/gps"))
    );
}
