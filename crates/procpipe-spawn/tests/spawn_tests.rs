// SPDX-License-Identifier: MIT OR Apache-2.0
//! Behavioral tests for the spawner, driving real `/bin/sh` children.
#![cfg(unix)]

use std::sync::Arc;

use procpipe_cmdline::CommandLine;
use procpipe_spawn::{LineMap, OutputLine, SpawnError, SpawnOptions, spawn, spawn_tagged};
use tokio_stream::StreamExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SH: &str = "/bin/sh";

fn sh(script: &str) -> CommandLine {
    CommandLine::from_list(["-c", script])
}

fn options() -> SpawnOptions {
    SpawnOptions::capture().expect("capture should succeed")
}

fn prefixed(prefix: &'static str) -> LineMap<String> {
    Arc::new(move |line| format!("{prefix}:{line}"))
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn maps_both_streams_and_preserves_per_stream_order() {
    let mut stream = spawn(
        SH,
        &sh(r"printf 'out1\nout2\n'; printf 'err1\n' >&2"),
        &options(),
        Some(prefixed("o")),
        Some(prefixed("e")),
    )
    .expect("spawn should succeed");

    let mut lines = Vec::new();
    while let Some(item) = stream.recv().await {
        lines.push(item.expect("no element should be an error"));
    }

    let outs: Vec<_> = lines
        .iter()
        .filter(|l| l.starts_with("o:"))
        .map(String::as_str)
        .collect();
    let errs: Vec<_> = lines
        .iter()
        .filter(|l| l.starts_with("e:"))
        .map(String::as_str)
        .collect();
    assert_eq!(outs, ["o:out1", "o:out2"]);
    assert_eq!(errs, ["e:err1"]);
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn silent_success_completes_with_no_elements() {
    let stream = spawn(
        SH,
        &sh("true"),
        &options(),
        Some(prefixed("o")),
        Some(prefixed("e")),
    )
    .expect("spawn should succeed");

    let lines = stream.collect_ok().await.expect("child should succeed");
    assert!(lines.is_empty());
}

#[tokio::test]
async fn stream_trait_yields_the_same_sequence() {
    let stream = spawn(
        SH,
        &sh(r"printf 'a\nb\n'"),
        &options(),
        Some(prefixed("o")),
        None,
    )
    .expect("spawn should succeed");

    let items: Vec<_> = stream.collect().await;
    let lines: Vec<_> = items
        .into_iter()
        .map(|i| i.expect("no element should be an error"))
        .collect();
    assert_eq!(lines, ["o:a", "o:b"]);
}

// ---------------------------------------------------------------------------
// Selector absence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stdout_only_selector_discards_stderr() {
    let stream = spawn(
        SH,
        &sh(r"printf 'keep\n'; printf 'drop\n' >&2"),
        &options(),
        Some(prefixed("o")),
        None,
    )
    .expect("spawn should succeed");

    let lines = stream.collect_ok().await.expect("child should succeed");
    assert_eq!(lines, ["o:keep"]);
}

#[tokio::test]
async fn no_selectors_still_drains_large_output() {
    // Well past the OS pipe buffer; the child would wedge if nobody read.
    let script = "i=0; while [ $i -lt 20000 ]; do echo line$i; i=$((i+1)); done";
    let stream = spawn::<String>(SH, &sh(script), &options(), None, None)
        .expect("spawn should succeed");

    let lines = stream.collect_ok().await.expect("child should succeed");
    assert!(lines.is_empty());
}

#[tokio::test]
async fn slow_consumer_loses_nothing() {
    // More lines than the channel buffers; the producers must block, not
    // drop, while the consumer sits idle.
    let script = "i=0; while [ $i -lt 1000 ]; do echo line$i; i=$((i+1)); done";
    let stream = spawn(
        SH,
        &sh(script),
        &options(),
        Some(Arc::new(|l| l) as LineMap<String>),
        None,
    )
    .expect("spawn should succeed");

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let lines = stream.collect_ok().await.expect("child should succeed");
    assert_eq!(lines.len(), 1000);
    assert_eq!(lines[0], "line0");
    assert_eq!(lines[999], "line999");
}

// ---------------------------------------------------------------------------
// Failure path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exit_code_error_arrives_after_output_and_fuses() {
    let mut stream = spawn(
        SH,
        &sh(r"printf 'line1\n'; exit 3"),
        &options(),
        Some(prefixed("o")),
        None,
    )
    .expect("spawn should succeed");
    let pid = stream.pid();

    let first = stream.recv().await.expect("first element should exist");
    assert_eq!(first.expect("first element should be a line"), "o:line1");

    let second = stream.recv().await.expect("terminal error should exist");
    match second.expect_err("second element should be the terminal error") {
        SpawnError::NonZeroExit {
            program,
            pid: err_pid,
            code,
        } => {
            assert_eq!(program, SH);
            assert_eq!(err_pid, pid);
            assert_eq!(code, Some(3));
        }
        other => panic!("expected NonZeroExit, got: {other}"),
    }

    assert!(stream.recv().await.is_none(), "stream must fuse after error");
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn signal_termination_reports_no_exit_code() {
    let mut stream = spawn(
        SH,
        &sh("kill -9 $$"),
        &options(),
        Some(prefixed("o")),
        None,
    )
    .expect("spawn should succeed");

    let item = stream.recv().await.expect("terminal error should exist");
    match item.expect_err("signal death should surface as an error") {
        SpawnError::NonZeroExit { code, .. } => assert_eq!(code, None),
        other => panic!("expected NonZeroExit, got: {other}"),
    }
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn missing_program_fails_synchronously() {
    let result = spawn::<String>(
        "procpipe-definitely-not-a-real-program",
        &CommandLine::empty(),
        &options(),
        None,
        None,
    );
    match result {
        Err(SpawnError::Start { program, .. }) => {
            assert_eq!(program, "procpipe-definitely-not-a-real-program");
        }
        Ok(_) => panic!("spawn of a missing program should fail"),
        Err(other) => panic!("expected Start, got: {other}"),
    }
}

#[tokio::test]
async fn collect_ok_surfaces_the_terminal_error() {
    let stream = spawn(
        SH,
        &sh("exit 7"),
        &options(),
        Some(prefixed("o")),
        None,
    )
    .expect("spawn should succeed");

    let err = stream
        .collect_ok()
        .await
        .expect_err("non-zero exit should error");
    assert!(matches!(
        err,
        SpawnError::NonZeroExit { code: Some(7), .. }
    ));
}

// ---------------------------------------------------------------------------
// Options application
// ---------------------------------------------------------------------------

#[tokio::test]
async fn child_starts_in_the_configured_directory() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let expected = tmp
        .path()
        .canonicalize()
        .expect("canonicalize should succeed");

    let stream = spawn(
        SH,
        &sh("pwd"),
        &options().with_working_dir(&expected),
        Some(Arc::new(|l| l) as LineMap<String>),
        None,
    )
    .expect("spawn should succeed");

    let lines = stream.collect_ok().await.expect("child should succeed");
    assert_eq!(lines.len(), 1);
    let reported = std::path::Path::new(&lines[0])
        .canonicalize()
        .expect("canonicalize should succeed");
    assert_eq!(reported, expected);
}

#[tokio::test]
async fn environment_is_replaced_and_later_duplicate_wins() {
    let opts = options()
        .clear_env()
        .add_env("TAG", "first")
        .and_then(|o| o.add_env("TAG", "second"))
        .expect("adds should succeed");

    let stream = spawn(
        SH,
        &sh(r#"echo "${TAG:-unset}"; echo "${HOME:-scrubbed}""#),
        &opts,
        Some(Arc::new(|l| l) as LineMap<String>),
        None,
    )
    .expect("spawn should succeed");

    let lines = stream.collect_ok().await.expect("child should succeed");
    // Later duplicate wins, and the parent's HOME did not leak through.
    assert_eq!(lines, ["second", "scrubbed"]);
}

// ---------------------------------------------------------------------------
// Tagged convenience
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tagged_spawn_labels_each_stream() {
    let stream = spawn_tagged(
        SH,
        &sh(r"printf 'out\n'; printf 'err\n' >&2"),
        &options(),
    )
    .expect("spawn should succeed");

    let mut lines = stream.collect_ok().await.expect("child should succeed");
    lines.sort_by_key(|l| matches!(l, OutputLine::Stderr(_)));
    assert_eq!(
        lines,
        [
            OutputLine::Stdout("out".into()),
            OutputLine::Stderr("err".into()),
        ]
    );
}

// ---------------------------------------------------------------------------
// Abandonment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropping_the_stream_does_not_kill_the_child() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let marker = tmp.path().join("survived");
    let opts = options()
        .set_env("MARKER", Some(marker.to_str().expect("utf-8 temp path")))
        .expect("set should succeed");

    let stream = spawn(
        SH,
        &sh(r#"echo started; sleep 0.3; : > "$MARKER""#),
        &opts,
        Some(Arc::new(|l| l) as LineMap<String>),
        None,
    )
    .expect("spawn should succeed");
    drop(stream);

    tokio::time::sleep(std::time::Duration::from_millis(900)).await;
    assert!(
        marker.exists(),
        "abandoned child should have run to completion"
    );
}
