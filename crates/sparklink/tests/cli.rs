#![cfg(all(unix, feature = "cli"))]

use std::process::{Command, Output, Stdio};
use std::thread;

use serde_json::Value;
use sparklink_frame::{FrameReader, FrameWriter};
use sparklink_transport::{TcpServer, TransportStream};

fn sparklink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sparklink"))
        .args(["--log-level", "error"])
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("sparklink should run")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout should be JSON ({err}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("sparklink-cli-{}-{name}", std::process::id()))
}

fn split(stream: TransportStream) -> (FrameReader<TransportStream>, FrameWriter<TransportStream>) {
    let reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
    (reader, FrameWriter::new(stream))
}

#[test]
fn version_prints_package_version() {
    let output = sparklink(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("sparklink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn parse_prints_tree_as_json() {
    let output = sparklink(&["--format", "json", "parse", "(time (now 1.0))(GS (t 0))"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout_json(&output),
        serde_json::json!([["time", ["now", "1.0"]], ["GS", ["t", "0"]]])
    );
}

#[test]
fn parse_rejects_unbalanced_message() {
    let output = sparklink(&["--format", "json", "parse", "(a (b)"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("malformed message"), "stderr: {stderr}");
}

#[test]
fn slip_encode_and_decode() {
    let encoded = sparklink(&["--format", "json", "slip", "encode", "--hex", "01c0db02"]);
    assert!(encoded.status.success());
    let json = stdout_json(&encoded);
    assert_eq!(json["hex"], "c001dbdcdbdd02c0");
    assert_eq!(json["output_size"], 8);

    let decoded = sparklink(&["--format", "pretty", "slip", "decode", "--hex", "c001dbdcdbdd02c0"]);
    assert!(decoded.status.success());
    assert_eq!(String::from_utf8_lossy(&decoded.stdout).trim(), "01c0db02");
}

#[test]
fn slip_decode_rejects_bad_escape() {
    let output = sparklink(&["slip", "decode", "--hex", "c001db05c0"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn send_waits_for_reply() {
    let server = TcpServer::bind("127.0.0.1:0").expect("bind");
    let addr = server.local_addr().expect("local addr").to_string();

    let simulator = thread::spawn(move || {
        let (mut reader, mut writer) = split(server.accept().expect("accept"));
        let received = reader.read_frame().expect("request frame");
        writer.send(b"(time (now 2.5))").expect("reply");
        received
    });

    let output = sparklink(&[
        "--format", "json", "send", &addr, "--data", "(syn)", "--wait", "--wait-timeout", "3s",
    ]);
    let received = simulator.join().expect("simulator thread");

    assert_eq!(received.as_ref(), b"(syn)");
    assert_eq!(output.status.code(), Some(0));
    let json = stdout_json(&output);
    assert_eq!(json["payload"], "(time (now 2.5))");
    assert_eq!(json["tree"], serde_json::json!([["time", ["now", "2.5"]]]));
}

#[test]
fn run_drives_cycles_against_simulator() {
    let server = TcpServer::bind("127.0.0.1:0").expect("bind");
    let addr = server.local_addr().expect("local addr").to_string();

    let simulator = thread::spawn(move || {
        let (mut reader, mut writer) = split(server.accept().expect("accept"));
        let scene = reader.read_frame().expect("scene message");
        writer.send(b"(time (now 0.02))").expect("first perception");
        let init = reader.read_frame().expect("init reply");
        let mut actions = Vec::new();
        while let Ok(frame) = reader.read_frame() {
            actions.push(frame);
            let _ = writer.send(b"(time (now 0.04))");
        }
        (scene, init, actions)
    });

    let recording = temp_path("run-record.log");
    let output = sparklink(&[
        "--format",
        "json",
        "run",
        &addr,
        "--record",
        recording.to_str().expect("utf-8 temp path"),
        "--scene",
        "(scene rsg/agent/nao/nao.rsg)",
        "--init",
        "(init (unum 7)(teamname sparks))",
        "--cycles",
        "3",
        "--cycle-timeout",
        "500ms",
    ]);
    let (scene, init, actions) = simulator.join().expect("simulator thread");

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(scene.as_ref(), b"(scene rsg/agent/nao/nao.rsg)");
    assert_eq!(init.as_ref(), b"(init (unum 7)(teamname sparks))");
    assert!(!actions.is_empty());
    assert!(actions.iter().all(|action| action.as_ref() == b"(syn)"));

    let json = stdout_json(&output);
    assert_eq!(json["summary"]["cycles"], 3);
    assert_eq!(json["summary"]["lost_main"], false);
    assert_eq!(json["final_behavior"], "stand");
    let sim_time = json["sim_time_ms"].as_u64().expect("simulation time reported");
    assert!(sim_time == 20 || sim_time == 40, "sim_time_ms = {sim_time}");

    let recorded = std::fs::read_to_string(&recording).expect("recording written");
    assert!(recorded.starts_with("(time (now 0.02))\n"), "recorded: {recorded}");
    std::fs::remove_file(&recording).expect("remove recording");
}

#[test]
fn replay_runs_agent_on_recorded_log() {
    let log = temp_path("replay-session.log");
    let actions = temp_path("replay-actions.log");
    std::fs::write(
        &log,
        "(time (now 0.02))(GS (t 0.00))\n(time (now 0.04))(GS (t 0.00))\n(time (now 0.06))(GS (t 0.02))\n",
    )
    .expect("write log");

    let output = sparklink(&[
        "--format",
        "json",
        "replay",
        log.to_str().expect("utf-8 temp path"),
        "--actions",
        actions.to_str().expect("utf-8 temp path"),
        "--cycle-timeout",
        "500ms",
    ]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json = stdout_json(&output);
    assert_eq!(json["summary"]["lost_main"], true);
    assert!(json["summary"]["perceptions"].as_u64().expect("perceptions") >= 1);
    assert!(json["sim_time_ms"].as_u64().is_some());

    let sent = std::fs::read_to_string(&actions).expect("action log written");
    assert!(!sent.is_empty());
    assert!(sent.lines().all(|line| line == "(syn)"), "actions: {sent}");

    std::fs::remove_file(&log).expect("remove log");
    std::fs::remove_file(&actions).expect("remove actions");
}

#[test]
fn replay_of_missing_log_fails() {
    let output = sparklink(&["replay", "/nonexistent/sparklink/session.log", "--cycles", "1"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn run_fails_when_simulator_is_down() {
    let addr = {
        let server = TcpServer::bind("127.0.0.1:0").expect("bind");
        server.local_addr().expect("local addr").to_string()
    };

    let output = sparklink(&["run", &addr, "--cycles", "1", "--cycle-timeout", "500ms"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("main channel failed to connect"), "stderr: {stderr}");
}
