//! `remnant` - check and fix stuck module deletion tasks.
//!
//! Usage:
//!   remnant --state <state.json> [--taskids 2,3,4|*] [--minimumfaildelay 60] [--fix]
//!
//! The state file is a JSON snapshot of the record store and the task queue.
//! With `--fix` the repaired state is written back to the same file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;

use remnant_core::app::{AppBuilder, RepairConfig, TaskFilter, render};
use remnant_core::domain::TaskId;
use remnant_core::impls::{RecordingEventSink, Snapshot, StoreBackedHooks};
use remnant_core::ports::{Clock, SystemClock, TaskQueue};
use remnant_core::queue::RetryPolicy;

/// Check and fix incomplete module deletion tasks.
#[derive(Parser, Debug)]
#[command(
    name = "remnant",
    about = "Check and fix incomplete module deletion tasks",
    after_help = "Example:\n  remnant --state state.json --taskids='*'\n  remnant --state state.json --taskids=2,3,4 --fix"
)]
struct Cli {
    /// Tasks to check or fix (comma-separated ids, or * for all).
    #[arg(short = 't', long = "taskids", value_parser = parse_task_ids)]
    taskids: Option<TaskSelection>,

    /// Only tasks whose fail delay is at least this many seconds.
    #[arg(short = 'm', long = "minimumfaildelay")]
    minimum_fail_delay: Option<u64>,

    /// Fix the listed tasks. Requires --taskids.
    #[arg(short = 'f', long = "fix", requires = "taskids")]
    fix: bool,

    /// JSON snapshot of the store and the queue.
    #[arg(long = "state", required = true)]
    state: PathBuf,

    /// Optional JSON repair configuration.
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskSelection {
    All,
    Ids(Vec<TaskId>),
}

fn parse_task_ids(raw: &str) -> Result<TaskSelection, String> {
    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() || parts.contains(&"*") {
        return Ok(TaskSelection::All);
    }
    parts
        .into_iter()
        .map(|p| {
            p.parse()
                .map(TaskId::new)
                .map_err(|_| format!("not a task id: {p:?}"))
        })
        .collect::<Result<_, _>>()
        .map(TaskSelection::Ids)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RepairConfig> {
    let Some(path) = path else {
        return Ok(RepairConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    Ok(RepairConfig::from_json(&text)?)
}

/// Run one invocation and return what goes to stdout.
async fn run(cli: Cli) -> anyhow::Result<String> {
    // --fix only ever touches tasks named one by one.
    if cli.fix && !matches!(cli.taskids, Some(TaskSelection::Ids(_))) {
        bail!("'--fix' requires '--taskids=[comma separated taskids]'");
    }
    let config = load_config(cli.config.as_deref())?;
    let minimum_fail_delay = cli
        .minimum_fail_delay
        .unwrap_or(config.default_minimum_fail_delay);

    info!("Loading state from {}", cli.state.display());
    let snapshot = Snapshot::load(&cli.state)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (store, queue) = snapshot.restore(clock.clone(), RetryPolicy::standard());
    let store = Arc::new(store);
    let queue = Arc::new(queue);

    let ids = match &cli.taskids {
        Some(TaskSelection::Ids(ids)) => Some(ids.clone()),
        Some(TaskSelection::All) | None => None,
    };
    let selected = queue
        .list_jobs(&config.task_kind, ids.as_deref(), None)
        .await?
        .len();
    if selected == 0 && !cli.fix {
        bail!("No {} adhoc tasks found", config.task_kind);
    }
    let total = queue.list_jobs(&config.task_kind, None, None).await?.len();

    let mut out = format!(
        "Checking {selected}/{total} {} adhoc tasks...\n\n",
        config.task_kind
    );
    if total == 0 {
        out.push_str(&format!("...No {} adhoc tasks found.\n\n", config.task_kind));
        return Ok(out);
    }

    let reporter = AppBuilder::new()
        .with_queue(queue.clone())
        .with_hooks(Arc::new(StoreBackedHooks::new(store.clone())))
        .with_store(store.clone())
        .with_events(Arc::new(RecordingEventSink::new()))
        .with_clock(clock)
        .with_config(config)
        .build()?;

    let filter = TaskFilter {
        ids,
        minimum_fail_delay: Some(minimum_fail_delay),
    };
    let report = if cli.fix {
        reporter.fix(&filter).await?
    } else {
        reporter.diagnose(&filter).await?
    };

    let text = render::run_report(&report);
    if text.is_empty() && !cli.fix {
        out.push_str(&format!(
            "... No issues found (minimum faildelay filter: {minimum_fail_delay} seconds)\n\n"
        ));
    } else {
        out.push_str(&text);
    }

    if cli.fix {
        Snapshot::capture(&store, &queue).await.save(&cli.state)?;
        info!("Repaired state written to {}", cli.state.display());
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    print!("{}", run(cli).await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn state() -> Value {
        json!({
            "tables": {
                "course": [{"id": 3, "cacherev": 1}],
                "context": [{"id": 30, "contextlevel": 50, "instanceid": 3}],
                "modules": [{"id": 5, "name": "page"}],
                "page": [{"id": 40}],
                "course_modules": [
                    {"id": 12, "course": 3, "module": 5, "instance": 40, "section": 8}
                ],
                "course_sections": [{"id": 8, "course": 3, "sequence": [12]}]
            },
            "jobs": [{
                "id": 7,
                "kind": "course_delete_modules",
                "actor_id": 2,
                "payload": {"targets": [{"id": 12, "container": 3, "kind": 5, "instance": 40, "placement": 8}]},
                "next_run_time": "2024-03-01T09:00:00Z",
                "fail_delay": 120
            }]
        })
    }

    fn write_state(dir: &TempDir, value: &Value) -> PathBuf {
        let path = dir.path().join("state.json");
        std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("remnant").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn task_ids_accept_lists_and_star() {
        assert_eq!(
            parse_task_ids("2, 3,4").unwrap(),
            TaskSelection::Ids(vec![TaskId::new(2), TaskId::new(3), TaskId::new(4)])
        );
        assert_eq!(parse_task_ids("*").unwrap(), TaskSelection::All);
        assert!(parse_task_ids("2,x").is_err());
    }

    #[test]
    fn fix_requires_task_ids() {
        let err = Cli::try_parse_from(["remnant", "--state", "s.json", "--fix"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[rstest]
    #[case::star("*")]
    #[case::empty("")]
    #[tokio::test]
    async fn fix_refuses_to_select_every_task(#[case] taskids: &str) {
        let dir = TempDir::new().unwrap();
        let path = write_state(&dir, &state());
        let before = std::fs::read_to_string(&path).unwrap();

        let parsed = cli(&["--state", path.to_str().unwrap(), "-t", taskids, "--fix"]);
        assert_eq!(parsed.taskids, Some(TaskSelection::All));
        let err = run(parsed).await.unwrap_err();

        assert!(err.to_string().contains("'--fix' requires '--taskids"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn scope_record_missing_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_state(&dir, &state());

        let out = run(cli(&["--state", path.to_str().unwrap(), "-t", "*"])).await.unwrap();

        assert!(out.starts_with("Checking 1/1 course_delete_modules adhoc tasks...\n\n"));
        assert!(out.contains("cm-12: Context table record missing"));
    }

    #[tokio::test]
    async fn healthy_state_reports_no_issues() {
        let dir = TempDir::new().unwrap();
        let mut value = state();
        value["tables"]["context"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": 90, "contextlevel": 70, "instanceid": 12}));
        let path = write_state(&dir, &value);

        let out = run(cli(&["--state", path.to_str().unwrap(), "-m", "60"])).await.unwrap();

        assert!(out.contains("No issues found (minimum faildelay filter: 60 seconds)"));
    }

    #[tokio::test]
    async fn fresh_tasks_are_filtered_by_fail_delay() {
        let dir = TempDir::new().unwrap();
        let path = write_state(&dir, &state());

        let out = run(cli(&["--state", path.to_str().unwrap(), "-m", "300"])).await.unwrap();

        assert!(out.contains("No issues found (minimum faildelay filter: 300 seconds)"));
    }

    #[tokio::test]
    async fn unknown_task_ids_are_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_state(&dir, &state());

        let err = run(cli(&["--state", path.to_str().unwrap(), "-t", "99"])).await.unwrap_err();

        assert!(err.to_string().contains("No course_delete_modules adhoc tasks found"));
    }

    #[tokio::test]
    async fn fix_repairs_and_writes_the_state_back() {
        let dir = TempDir::new().unwrap();
        let path = write_state(&dir, &state());

        let out = run(cli(&["--state", path.to_str().unwrap(), "-t", "7", "--fix"]))
            .await
            .unwrap();

        assert!(out.contains("Result messages"));
        assert!(out.contains("[SUCCESS] Module fix successful"));

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["tables"]["course_modules"], json!([]));
        assert_eq!(saved["tables"]["course_sections"][0]["sequence"], json!([]));
        assert_eq!(saved["jobs"][0]["fail_delay"], 0);
    }
}
