//! Process lifecycle integration tests - real child processes via `sh -c`
//!
//! `cargo test -p ralph-task --test lifecycle_test`

#![cfg(unix)]

use ralph_foundation::{
    Channel, Error, HubConfig, LogLevel, LogLine, LogSource, NoticeKind, Result, StreamMessage,
};
use ralph_task::{
    CommandBuilder, CommandSpec, DirectoryRegistry, Engine, EngineConfig, LaunchOptions,
    ProjectState, SupervisorConfig, WatcherConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Fixture
// ============================================================================

/// Runs the same command for every project
struct FixedCommand {
    program: String,
    args: Vec<String>,
}

impl FixedCommand {
    fn sh(script: &str) -> Self {
        Self {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    fn program(program: &str) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

impl CommandBuilder for FixedCommand {
    fn build(&self, _project: &str, workdir: &Path, _options: &LaunchOptions) -> Result<CommandSpec> {
        Ok(CommandSpec::new(&self.program, workdir).args(self.args.clone()))
    }
}

fn fixture_with(command: FixedCommand, stop_grace: Duration) -> (TempDir, Arc<Engine>) {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("demo/.ralph-tui/logs")).expect("project dir");

    let config = EngineConfig {
        supervisor: SupervisorConfig {
            stop_grace,
            kill_wait: Duration::from_secs(2),
            reader_drain: Duration::from_secs(1),
        },
        watcher: WatcherConfig {
            poll_interval: Duration::from_millis(20),
            ..WatcherConfig::default()
        },
        hub: HubConfig {
            delivery_tick: Duration::from_millis(10),
            ..HubConfig::default()
        },
        ..EngineConfig::default()
    };
    let registry = Arc::new(DirectoryRegistry::new(dir.path()));
    let engine = Engine::new(config, registry, Arc::new(command));
    (dir, Arc::new(engine))
}

fn fixture(command: FixedCommand) -> (TempDir, Arc<Engine>) {
    fixture_with(command, Duration::from_secs(3))
}

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(10), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {}", what);
}

async fn wait_exit(engine: &Engine, project: &str) -> ralph_task::ProcessStatus {
    engine
        .supervisor()
        .wait_for_exit(project, Duration::from_secs(10))
        .await
        .expect("process did not exit")
}

fn texts(lines: &[LogLine], source: LogSource) -> Vec<String> {
    lines
        .iter()
        .filter(|l| l.source == source)
        .map(|l| l.text.clone())
        .collect()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_launch_to_completion() {
    let (_dir, engine) = fixture(FixedCommand::sh("echo one; echo two; echo three"));

    let status = engine
        .launch("demo", LaunchOptions::default())
        .await
        .expect("launch failed");
    assert_eq!(status.state, ProjectState::Running);
    assert!(status.pid.is_some());

    let status = wait_exit(&engine, "demo").await;
    assert_eq!(status.state, ProjectState::Completed);
    assert_eq!(status.exit_code, Some(0));

    let lines = engine.get_lines("demo", 10, None, None);
    assert_eq!(lines.len(), 5);
    assert!(lines[0].text.starts_with("[LAUNCH]"));
    assert_eq!(texts(&lines, LogSource::Stdout), vec!["one", "two", "three"]);
    assert_eq!(lines[4].text, "[EXIT] Process exited with code 0");
    assert!(lines.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(engine.list_active().is_empty());
}

#[tokio::test]
async fn test_output_after_exit_is_still_collected() {
    // The background subshell outlives `sh` and keeps stdout open.
    let (_dir, engine) = fixture(FixedCommand::sh("(sleep 2; echo late) & echo early"));
    engine.launch("demo", LaunchOptions::default()).await.unwrap();

    let status = wait_exit(&engine, "demo").await;
    assert_eq!(status.state, ProjectState::Completed);

    wait_until("late output", || {
        texts(&engine.get_lines("demo", 0, None, None), LogSource::Stdout).len() == 2
    })
    .await;
    let lines = engine.get_lines("demo", 0, None, None);
    assert_eq!(texts(&lines, LogSource::Stdout), vec!["early", "late"]);
    assert!(lines.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[tokio::test]
async fn test_concurrent_launch_single_winner() {
    let (_dir, engine) = fixture(FixedCommand::sh("sleep 30"));

    let attempts: Vec<_> = (0..5)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.launch("demo", LaunchOptions::default()).await })
        })
        .collect();

    let mut launched = 0;
    for attempt in attempts {
        match attempt.await.expect("join") {
            Ok(_) => launched += 1,
            Err(Error::AlreadyRunning(project)) => assert_eq!(project, "demo"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(launched, 1);
    assert_eq!(engine.list_active(), vec!["demo"]);

    engine.stop("demo").await.expect("stop failed");
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (_dir, engine) = fixture(FixedCommand::sh("sleep 30"));
    engine.launch("demo", LaunchOptions::default()).await.unwrap();

    let first = engine.stop("demo").await.expect("first stop");
    assert_eq!(first.state, ProjectState::Stopped);
    assert_eq!(first.exit_code, Some(-15));
    let second = engine.stop("demo").await.expect("second stop");
    assert_eq!(second.state, ProjectState::Stopped);

    let lines = engine.get_lines("demo", 0, None, None);
    assert_eq!(
        lines.last().map(|l| l.text.as_str()),
        Some("[EXIT] Process stopped (code -15)")
    );
}

#[tokio::test]
async fn test_stop_escalates_to_sigkill() {
    let (_dir, engine) = fixture_with(
        FixedCommand::sh("trap '' TERM; echo ready; while true; do sleep 0.1; done"),
        Duration::from_millis(300),
    );
    engine.launch("demo", LaunchOptions::default()).await.unwrap();
    wait_until("ready line", || {
        !engine.get_lines("demo", 0, Some("ready"), None).is_empty()
    })
    .await;

    let status = engine.stop("demo").await.expect("stop failed");
    assert_eq!(status.state, ProjectState::Stopped);
    assert!(!engine
        .get_lines("demo", 0, Some("sending SIGKILL"), None)
        .is_empty());
}

#[tokio::test]
async fn test_pause_resume_keeps_all_output() {
    let (_dir, engine) = fixture(FixedCommand::sh(
        "i=0; while [ $i -lt 30 ]; do echo line$i; i=$((i+1)); sleep 0.05; done",
    ));
    engine.launch("demo", LaunchOptions::default()).await.unwrap();
    wait_until("first output", || {
        !texts(&engine.get_lines("demo", 0, None, None), LogSource::Stdout).is_empty()
    })
    .await;

    let paused = engine.pause("demo").await.expect("pause failed");
    assert_eq!(paused.state, ProjectState::Paused);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.status("demo").state, ProjectState::Paused);

    let resumed = engine.resume("demo").await.expect("resume failed");
    assert_eq!(resumed.state, ProjectState::Running);

    let status = wait_exit(&engine, "demo").await;
    assert_eq!(status.state, ProjectState::Completed);

    let lines = engine.get_lines("demo", 0, None, None);
    let expected: Vec<String> = (0..30).map(|i| format!("line{}", i)).collect();
    assert_eq!(texts(&lines, LogSource::Stdout), expected);

    let pause_at = lines.iter().position(|l| l.text.starts_with("[PAUSE]"));
    let resume_at = lines.iter().position(|l| l.text.starts_with("[RESUME]"));
    assert!(pause_at.is_some() && resume_at.is_some());
    assert!(pause_at < resume_at);
}

#[tokio::test]
async fn test_nonzero_exit_is_error() {
    let (_dir, engine) = fixture(FixedCommand::sh("echo boom >&2; exit 3"));
    engine.launch("demo", LaunchOptions::default()).await.unwrap();

    let status = wait_exit(&engine, "demo").await;
    assert_eq!(status.state, ProjectState::Error);
    assert_eq!(status.exit_code, Some(3));
    assert_eq!(status.last_error.as_deref(), Some("Exited with code 3"));

    let lines = engine.get_lines("demo", 0, None, None);
    assert_eq!(texts(&lines, LogSource::Stderr), vec!["boom"]);

    // A finished project can be launched again.
    engine
        .launch("demo", LaunchOptions::default())
        .await
        .expect("relaunch failed");
    wait_exit(&engine, "demo").await;
}

#[tokio::test]
async fn test_spawn_failure() {
    let (_dir, engine) = fixture(FixedCommand::program("/nonexistent/ralph-tui"));

    for _ in 0..2 {
        let result = engine.launch("demo", LaunchOptions::default()).await;
        assert!(matches!(result, Err(Error::ProcessSpawnFailed { .. })));
    }

    let status = engine.status("demo");
    assert_eq!(status.state, ProjectState::Error);
    assert!(status.last_error.is_some());
    assert!(status.pid.is_none());

    let errors = engine.get_lines("demo", 0, None, Some(LogLevel::Error));
    assert_eq!(errors.len(), 2);
    assert!(errors[0].text.starts_with("[LOG ERROR]"));
}

#[tokio::test]
async fn test_state_mismatch_errors() {
    let (_dir, engine) = fixture(FixedCommand::sh("sleep 30"));

    assert!(matches!(engine.pause("demo").await, Err(Error::NotRunning(_))));
    assert!(matches!(engine.resume("demo").await, Err(Error::NotPaused(_))));
    assert!(matches!(engine.stop("demo").await, Err(Error::NotRunning(_))));
    assert!(matches!(
        engine.launch("ghost", LaunchOptions::default()).await,
        Err(Error::ProjectNotFound(_))
    ));

    engine.launch("demo", LaunchOptions::default()).await.unwrap();
    assert!(matches!(engine.resume("demo").await, Err(Error::NotPaused(_))));
    engine.pause("demo").await.unwrap();
    assert!(matches!(engine.pause("demo").await, Err(Error::NotRunning(_))));
    assert!(matches!(
        engine.launch("demo", LaunchOptions::default()).await,
        Err(Error::AlreadyRunning(_))
    ));

    // Stopping from paused must not hang on the suspended process.
    let status = engine.stop("demo").await.expect("stop from paused");
    assert_eq!(status.state, ProjectState::Stopped);
}

// ============================================================================
// Streaming
// ============================================================================

async fn collect_until_exit(mut sub: ralph_foundation::Subscription) -> (bool, Vec<String>) {
    let mut first_is_backlog = None;
    let mut stdout = Vec::new();

    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(message) = sub.next().await {
            first_is_backlog.get_or_insert(message.is_backlog());
            match message {
                StreamMessage::Log { lines, .. } | StreamMessage::LogHistory { lines, .. } => {
                    stdout.extend(texts(&lines, LogSource::Stdout));
                }
                StreamMessage::Notice(notice) if notice.kind == NoticeKind::ProcessExited => {
                    return true;
                }
                _ => {}
            }
        }
        false
    })
    .await;

    assert_eq!(finished, Ok(true), "no exit notice received");
    (first_is_backlog.unwrap_or(false), stdout)
}

#[tokio::test]
async fn test_subscribers_receive_identical_stream() {
    let (_dir, engine) = fixture(FixedCommand::sh("echo a; echo b; echo c"));

    let first = engine.attach(Channel::logs("demo")).expect("attach first");
    let second = engine.attach_named("logs:demo").expect("attach second");

    engine.launch("demo", LaunchOptions::default()).await.unwrap();

    let (a, b) = tokio::join!(collect_until_exit(first), collect_until_exit(second));
    assert!(a.0 && b.0, "backlog frame must come first");
    assert_eq!(a.1, vec!["a", "b", "c"]);
    assert_eq!(a.1, b.1);
}

#[tokio::test]
async fn test_late_subscriber_gets_backlog() {
    let (_dir, engine) = fixture(FixedCommand::sh("echo early"));
    engine.launch("demo", LaunchOptions::default()).await.unwrap();
    wait_exit(&engine, "demo").await;

    let mut sub = engine.attach(Channel::logs("demo")).unwrap();
    match sub.next().await {
        Some(StreamMessage::LogHistory { project, lines }) => {
            assert_eq!(project, "demo");
            assert_eq!(texts(&lines, LogSource::Stdout), vec!["early"]);
        }
        other => panic!("expected backlog, got {:?}", other),
    }
    sub.detach();
    assert!(!sub.detach());
}

// ============================================================================
// File watching
// ============================================================================

#[tokio::test]
async fn test_launch_tails_project_log_files() {
    let (dir, engine) = fixture(FixedCommand::sh(
        "sleep 0.3; echo from-file >> .ralph-tui/logs/run.log; sleep 0.3",
    ));
    let log = dir.path().join("demo/.ralph-tui/logs/run.log");
    std::fs::write(&log, "old line\n").unwrap();

    engine.launch("demo", LaunchOptions::default()).await.unwrap();
    assert_eq!(engine.watched_files("demo"), vec![log]);

    wait_until("tailed line", || {
        texts(&engine.get_lines("demo", 0, None, None), LogSource::File) == vec!["from-file"]
    })
    .await;

    wait_exit(&engine, "demo").await;
    engine.shutdown().await;
    assert!(engine.watched_files("demo").is_empty());
}

#[tokio::test]
async fn test_watch_external_file() {
    let (dir, engine) = fixture(FixedCommand::sh("true"));
    let path = dir.path().join("demo/external.log");

    engine.watch_file("demo", &path).expect("watch");
    wait_until("waiting notice", || {
        !engine.get_lines("demo", 0, Some("Waiting for log file"), None).is_empty()
    })
    .await;

    std::fs::write(&path, "hello\nworld\n").unwrap();
    wait_until("file lines", || {
        texts(&engine.get_lines("demo", 0, None, None), LogSource::File) == vec!["hello", "world"]
    })
    .await;

    assert_eq!(engine.stop_watchers("demo").await, 1);
}
