//! End-to-end runs of the supervisor.
//!
//! Function items re-execute this test binary, so `main` must route worker processes through `enter` before anything else.
use std::{future::Future, path::Path, time::Duration};

use cronvisor_bundle::{Bundle, ErrorBundler};
use cronvisor_core::{CoreError, Supervisor, SupervisorConfig, report::OVER_TIME_LIMIT};
use cronvisor_exec::{LaunchConfig, handle::KILLED_NOTE};
use cronvisor_model::{ExecSpec, Outcome, RunReport, TimeLimits, WorkItem};

fn quick() -> anyhow::Result<()> {
    std::thread::sleep(Duration::from_millis(200));
    Ok(())
}

fn raises() -> anyhow::Result<()> {
    anyhow::bail!("upstream returned garbage")
}

fn hangs() -> anyhow::Result<()> {
    std::thread::sleep(Duration::from_secs(30));
    Ok(())
}

fn bundles() -> anyhow::Result<()> {
    let mut bundler = ErrorBundler::new().with_descriptor("record import");
    for id in 0..3u32 {
        bundler.attempt(Some(id), || -> anyhow::Result<()> {
            anyhow::bail!("record rejected")
        })?;
    }
    bundler.finalize()?;
    Ok(())
}

fn catalog() -> Vec<WorkItem> {
    vec![
        WorkItem::function("quick", quick),
        WorkItem::function("raises", raises),
        WorkItem::function("hangs", hangs),
        WorkItem::function("bundles", bundles),
    ]
}

fn pick(names: &[&str]) -> Vec<WorkItem> {
    let all = catalog();
    names
        .iter()
        .map(|n| {
            all.iter()
                .find(|i| i.name() == *n)
                .cloned()
                .unwrap_or_else(|| panic!("unknown item {n}"))
        })
        .collect()
}

fn append(name: &str, path: &Path) -> WorkItem {
    let spec = ExecSpec::new("sh").with_args([
        "-c".to_string(),
        "sleep 0.1; echo \"$0\" >> \"$1\"".to_string(),
        name.to_string(),
        path.display().to_string(),
    ]);
    WorkItem::exec(name, spec)
}

fn supervisor() -> Supervisor {
    let launch = LaunchConfig::default().with_kill_grace(Duration::from_millis(500));
    Supervisor::new(
        SupervisorConfig::default()
            .with_tick(Duration::from_millis(50))
            .with_launch(launch),
    )
}

fn failed_report(result: Result<RunReport, CoreError>) -> RunReport {
    match result {
        Err(CoreError::RunFailed { report, .. }) => *report,
        other => panic!("expected a failed run, got {other:?}"),
    }
}

async fn all_items_finish_when_concurrency_covers_set() {
    let mut items = pick(&["quick"]);
    items.push(WorkItem::exec("true", ExecSpec::new("true")));
    items.push(WorkItem::exec("sleepy", ExecSpec::new("sleep").with_args(["0.2"])));

    let report = supervisor()
        .run(items, TimeLimits::from_secs(5), Some(3))
        .await
        .unwrap();

    assert!(!report.had_errors);
    assert_eq!(report.items.len(), 3);
    assert!(report.items.iter().all(|i| i.outcome == Outcome::Succeeded));
    assert_eq!(report.items[0].name, "quick");
}

async fn serial_admission_follows_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("order.log");
    let items = vec![append("first", &log), append("second", &log), append("third", &log)];

    let report = supervisor()
        .run(items, TimeLimits::from_secs(5), Some(1))
        .await
        .unwrap();

    assert_eq!(report.items.len(), 3);
    assert!(report.items.iter().all(|i| i.outcome.is_success()));
    let order = std::fs::read_to_string(&log).unwrap();
    assert_eq!(order.lines().collect::<Vec<_>>(), ["first", "second", "third"]);
}

async fn ordinary_failure_is_one_error_line() {
    let result = supervisor()
        .run(pick(&["quick", "raises"]), TimeLimits::from_secs(5), None)
        .await;
    let report = failed_report(result);

    assert!(report.had_errors);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("raises failed"));
    assert!(report.errors.iter().all(|l| !l.starts_with("quick")));
    assert_eq!(report.item("raises").map(|i| i.outcome), Some(Outcome::Failed { code: Some(1) }));
}

async fn overdue_item_is_killed() {
    let limits = TimeLimits::from_secs(1).with_hard(Duration::from_secs(2));
    let result = supervisor()
        .run(pick(&["quick", "raises", "hangs"]), limits, Some(2))
        .await;
    let report = failed_report(result);

    assert_eq!(report.item("quick").map(|i| i.outcome), Some(Outcome::Succeeded));
    assert!(matches!(report.item("raises").map(|i| i.outcome), Some(Outcome::Failed { .. })));

    let hangs = report.item("hangs").unwrap();
    assert_eq!(hangs.outcome, Outcome::Killed);
    assert!(hangs.message.ends_with(KILLED_NOTE));

    assert!(report.errors.iter().any(|l| l.starts_with("raises failed")));
    assert!(report.errors.iter().any(|l| l.starts_with("hangs was killed")));
    assert!(report.errors.iter().any(|l| l.contains(OVER_TIME_LIMIT)));
    assert!(report.elapsed < Duration::from_secs(10));
}

async fn unbounded_serial_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("unbounded.log");
    let limits = TimeLimits::from_secs(5).unbounded();

    let mut items = pick(&["quick"]);
    items.push(append("a", &log));
    items.push(append("b", &log));

    let report = supervisor().run(items, limits, Some(1)).await.unwrap();

    assert!(report.items.iter().all(|i| i.outcome != Outcome::NeverRan));
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 2);
}

async fn hard_deadline_leaves_queue_unstarted() {
    let limits = TimeLimits::from_secs(1).with_hard(Duration::from_millis(300));
    let result = supervisor()
        .run(pick(&["hangs", "quick"]), limits, Some(1))
        .await;
    let report = failed_report(result);

    assert_eq!(report.item("hangs").map(|i| i.outcome), Some(Outcome::Killed));
    assert_eq!(report.item("quick").map(|i| i.outcome), Some(Outcome::NeverRan));
    assert!(report.errors.contains(&"quick never ran".to_string()));
}

async fn zero_concurrency_returns_immediately() {
    let limits = TimeLimits::from_secs(1).unbounded();
    let result = supervisor().run(pick(&["quick"]), limits, Some(0)).await;
    let report = failed_report(result);

    assert_eq!(report.item("quick").map(|i| i.outcome), Some(Outcome::NeverRan));
    assert!(report.elapsed < Duration::from_secs(1));
}

async fn bundled_failure_exits_nonzero() {
    let result = supervisor()
        .run(pick(&["bundles"]), TimeLimits::from_secs(5), None)
        .await;
    let report = failed_report(result);

    assert_eq!(report.item("bundles").map(|i| i.outcome), Some(Outcome::Failed { code: Some(1) }));
    assert_eq!(report.errors.len(), 1);
}

async fn launch_failure_is_reported_per_item() {
    let items = vec![
        WorkItem::exec("missing", ExecSpec::new("/nonexistent/cronvisor-missing")),
        WorkItem::exec("ok", ExecSpec::new("true")),
    ];
    let result = supervisor().run(items, TimeLimits::from_secs(5), Some(1)).await;
    let report = failed_report(result);

    assert_eq!(report.item("missing").map(|i| i.outcome), Some(Outcome::LaunchFailed));
    assert_eq!(report.item("ok").map(|i| i.outcome), Some(Outcome::Succeeded));
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("missing failed to launch"));
}

async fn duplicate_names_fail_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("dup.log");
    let items = vec![append("same", &log), append("same", &log)];

    let err = supervisor()
        .run(items, TimeLimits::from_secs(5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateName(name) if name == "same"));
    assert!(!log.exists());
}

async fn empty_run_is_successful() {
    let report = supervisor()
        .run(Vec::new(), TimeLimits::from_secs(5), None)
        .await
        .unwrap();
    assert!(!report.had_errors);
    assert!(report.items.is_empty());
}

async fn stubborn_workers_share_one_grace_period() {
    let items: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|n| WorkItem::exec(n, ExecSpec::new("sh").with_args(["-c", "trap '' TERM; sleep 4"])))
        .collect();
    let launch = LaunchConfig::default().with_kill_grace(Duration::from_secs(1));
    let sup = Supervisor::new(
        SupervisorConfig::default()
            .with_tick(Duration::from_millis(50))
            .with_launch(launch),
    );
    let limits = TimeLimits::from_secs(1).with_hard(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let report = failed_report(sup.run(items, limits, None).await);

    assert!(started.elapsed() < Duration::from_millis(2500), "took {:?}", started.elapsed());
    assert!(report.items.iter().all(|i| i.outcome == Outcome::Killed));
}

async fn kill_reaches_job_descendants() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("late");
    let spec = ExecSpec::new("sh")
        .with_args(["-c", "(sleep 1; touch \"$MARKER\") & wait"])
        .with_env("MARKER", marker.display().to_string());
    let limits = TimeLimits::from_secs(1).with_hard(Duration::from_millis(300));

    let report = failed_report(
        supervisor()
            .run(vec![WorkItem::exec("spawner", spec)], limits, None)
            .await,
    );
    assert_eq!(report.item("spawner").map(|i| i.outcome), Some(Outcome::Killed));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists());
}

async fn scenario<F: Future<Output = ()>>(name: &str, fut: F) {
    print!("test {name} ... ");
    fut.await;
    println!("ok");
}

fn main() {
    cronvisor_exec::enter(&catalog());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    rt.block_on(async {
        scenario("all_items_finish_when_concurrency_covers_set", all_items_finish_when_concurrency_covers_set()).await;
        scenario("serial_admission_follows_input_order", serial_admission_follows_input_order()).await;
        scenario("ordinary_failure_is_one_error_line", ordinary_failure_is_one_error_line()).await;
        scenario("overdue_item_is_killed", overdue_item_is_killed()).await;
        scenario("unbounded_serial_run_completes", unbounded_serial_run_completes()).await;
        scenario("hard_deadline_leaves_queue_unstarted", hard_deadline_leaves_queue_unstarted()).await;
        scenario("zero_concurrency_returns_immediately", zero_concurrency_returns_immediately()).await;
        scenario("bundled_failure_exits_nonzero", bundled_failure_exits_nonzero()).await;
        scenario("launch_failure_is_reported_per_item", launch_failure_is_reported_per_item()).await;
        scenario("duplicate_names_fail_before_launch", duplicate_names_fail_before_launch()).await;
        scenario("empty_run_is_successful", empty_run_is_successful()).await;
        scenario("stubborn_workers_share_one_grace_period", stubborn_workers_share_one_grace_period()).await;
        scenario("kill_reaches_job_descendants", kill_reaches_job_descendants()).await;
    });
}
