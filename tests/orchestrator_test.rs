//! End-to-end orchestrator tests over mock collaborators
//!
//! A scripted driver stands in for the editor session and a mock scanner
//! (backed by `echo` so the process plumbing is real) stands in for bandit.
//! These tests exercise the full round/phase/target loop: skip feed-forward
//! after a first success, keep/revert sequencing, abort on open failure,
//! resubmission on incomplete responses, and failed rows when a response
//! never completes.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use cweprobe::completion::{CompletionDetector, RetryPolicy};
use cweprobe::context::RunContext;
use cweprobe::domain::{
    Confidence, EditAction, FunctionKey, Severity, VulnerabilityRecord, WeaknessClass,
};
use cweprobe::driver::InteractionDriver;
use cweprobe::error::ProbeError;
use cweprobe::orchestrator::{
    parse_targets, Orchestrator, OrchestratorOptions, Pacing, PromptTemplates, RunOutcome,
    TranscriptWriter,
};
use cweprobe::scan::{ExternalScanner, RawReport, ScanAggregator};
use cweprobe::stats::{Disposition, RoundCell, StatsTracker};
use cweprobe::storage::OutputLayout;

/// Scripted interaction driver
struct MockDriver {
    open_ok: bool,
    submit_ok: bool,
    /// Responses popped per capture; the last one repeats once exhausted
    responses: Mutex<VecDeque<String>>,
    submits: AtomicUsize,
    clears: AtomicUsize,
    edit_actions: Mutex<Vec<EditAction>>,
}

impl MockDriver {
    fn completing(responses: &[&str]) -> Self {
        Self {
            open_ok: true,
            submit_ok: true,
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            submits: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            edit_actions: Mutex::new(Vec::new()),
        }
    }

    fn always(response: &str) -> Self {
        Self::completing(&[response])
    }
}

#[async_trait]
impl InteractionDriver for MockDriver {
    async fn open_target(&self, _path: &Path) -> bool {
        self.open_ok
    }

    async fn submit(&self, _text: &str) -> bool {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submit_ok
    }

    async fn await_completion(&self, _timeout: Option<Duration>) -> bool {
        true
    }

    async fn capture_output(&self) -> Option<String> {
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        }
    }

    async fn apply_or_discard_edits(&self, action: EditAction) -> bool {
        self.edit_actions.lock().unwrap().push(action);
        true
    }

    async fn clear_pending_input(&self) -> bool {
        self.clears.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Scanner whose process is a real `echo` and whose findings are scripted
/// per invocation
struct MockScanner {
    per_scan: Mutex<VecDeque<Vec<VulnerabilityRecord>>>,
}

impl MockScanner {
    fn new(per_scan: Vec<Vec<VulnerabilityRecord>>) -> Self {
        Self {
            per_scan: Mutex::new(per_scan.into()),
        }
    }

    fn clean() -> Self {
        Self::new(Vec::new())
    }
}

impl ExternalScanner for MockScanner {
    fn id(&self) -> &'static str {
        "mock"
    }

    fn binary(&self) -> &str {
        "echo"
    }

    fn supports(&self, _weakness: &WeaknessClass) -> bool {
        true
    }

    fn invocation(&self, _file: &Path, _weakness: &WeaknessClass) -> Option<Vec<String>> {
        Some(vec!["echo".into(), "{}".into()])
    }

    fn parse(
        &self,
        _report: &RawReport,
        _file: &str,
        _weakness: &WeaknessClass,
    ) -> Result<Vec<VulnerabilityRecord>, ProbeError> {
        Ok(self.per_scan.lock().unwrap().pop_front().unwrap_or_default())
    }
}

fn finding_at(line: u32) -> VulnerabilityRecord {
    VulnerabilityRecord::finding(
        WeaknessClass::new("078"),
        "app.py",
        line,
        "mock",
        Severity::High,
        Confidence::High,
        "os.system with user input",
    )
}

struct Fixture {
    orchestrator: Orchestrator,
    layout: OutputLayout,
}

/// Build a full orchestrator over a temp project containing `app.py` with
/// one function, `event`, spanning lines 1-3.
fn fixture(root: &Path, rounds: u32, driver: Arc<MockDriver>, scanner: MockScanner) -> Fixture {
    fixture_with_retry(root, rounds, driver, scanner, None)
}

fn fixture_with_retry(
    root: &Path,
    rounds: u32,
    driver: Arc<MockDriver>,
    scanner: MockScanner,
    max_retries: Option<u32>,
) -> Fixture {
    let project = root.join("project");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::write(
        project.join("app.py"),
        "def event():\n    cmd = input()\n    return cmd\n",
    )
    .unwrap();

    let weakness = WeaknessClass::new("078");
    let layout = OutputLayout::new(root.join("out"), "project", weakness.clone());
    let aggregator = ScanAggregator::new(
        &project,
        vec![Arc::new(scanner)],
        Duration::from_secs(30),
    );

    let targets = parse_targets("app.py|event\n");
    let tracker = StatsTracker::initialize(
        layout.clone(),
        rounds,
        aggregator.scanner_ids(),
        targets.iter().map(|(_, t)| t.key()),
    )
    .unwrap();

    let zero = Duration::ZERO;
    let options = OrchestratorOptions {
        project,
        weakness,
        rounds,
        templates: PromptTemplates::default(),
        pacing: Pacing {
            after_open: zero,
            between_targets: zero,
            between_phases: zero,
            between_rounds: zero,
        },
        completion_timeout: Some(Duration::from_secs(1)),
    };

    let orchestrator = Orchestrator::new(
        options,
        driver,
        aggregator,
        tracker,
        CompletionDetector::default(),
        RetryPolicy {
            wait: zero,
            progress_interval: Duration::from_secs(1),
            max_retries,
        },
        TranscriptWriter::new(layout.clone()),
        RunContext::new(),
        targets,
    );

    Fixture {
        orchestrator,
        layout,
    }
}

#[tokio::test]
async fn vulnerable_round_one_is_skipped_afterwards() {
    let dir = tempdir().unwrap();
    let driver = Arc::new(MockDriver::always("done\nResponse completed"));
    // First implementation scan finds line 2; nothing is ever scanned again
    let scanner = MockScanner::new(vec![vec![finding_at(2)]]);
    let mut fx = fixture(dir.path(), 2, driver.clone(), scanner);

    let outcome = fx.orchestrator.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Done);

    // Round 1: two phases, one submission each. Round 2: target skipped.
    assert_eq!(driver.submits.load(Ordering::SeqCst), 2);

    // Edits are kept after structure and reverted after implementation,
    // in both rounds (the phase runs even when every target is skipped)
    assert_eq!(
        *driver.edit_actions.lock().unwrap(),
        vec![
            EditAction::Keep,
            EditAction::Revert,
            EditAction::Keep,
            EditAction::Revert
        ]
    );

    let key = FunctionKey::new("app.py", "event");
    let row = fx.orchestrator.tracker().table().row(&key).unwrap();
    assert_eq!(
        row.cells[0],
        RoundCell::Vulnerable {
            count: 1,
            scanner: "mock".into()
        }
    );
    assert_eq!(row.cells[1], RoundCell::Skipped);
    assert_eq!(row.disposition, Some(Disposition::Vulnerable(1)));
}

#[tokio::test]
async fn clean_scans_every_round_end_all_safe() {
    let dir = tempdir().unwrap();
    let driver = Arc::new(MockDriver::always("ok\n已完成回答"));
    let mut fx = fixture(dir.path(), 2, driver.clone(), MockScanner::clean());

    let outcome = fx.orchestrator.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Done);

    // Never skipped: both rounds submit both phases
    assert_eq!(driver.submits.load(Ordering::SeqCst), 4);

    let key = FunctionKey::new("app.py", "event");
    let row = fx.orchestrator.tracker().table().row(&key).unwrap();
    assert_eq!(row.cells[0], RoundCell::Safe);
    assert_eq!(row.cells[1], RoundCell::Safe);
    assert_eq!(row.disposition, Some(Disposition::AllSafe));

    // The statistics table is on disk and parseable
    let csv = std::fs::read_to_string(fx.layout.stats_table_path()).unwrap();
    assert!(csv.contains("app.py_event()"));
    assert!(csv.contains("All-Safe"));
}

#[tokio::test]
async fn open_failure_aborts_the_run() {
    let dir = tempdir().unwrap();
    let mut driver = MockDriver::always("Response completed");
    driver.open_ok = false;
    let mut fx = fixture(dir.path(), 1, Arc::new(driver), MockScanner::clean());

    let err = fx.orchestrator.run().await.unwrap_err();
    let probe = err.downcast_ref::<ProbeError>().unwrap();
    assert!(matches!(probe, ProbeError::TargetOpen { .. }));
    assert!(probe.is_fatal());
}

#[tokio::test]
async fn first_submit_failure_aborts_the_run() {
    let dir = tempdir().unwrap();
    let mut driver = MockDriver::always("Response completed");
    driver.submit_ok = false;
    let mut fx = fixture(dir.path(), 1, Arc::new(driver), MockScanner::clean());

    let err = fx.orchestrator.run().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProbeError>().unwrap(),
        ProbeError::Submit { .. }
    ));
}

#[tokio::test]
async fn incomplete_response_is_cleared_and_resubmitted() {
    let dir = tempdir().unwrap();
    // First capture is cut off; the retry completes. Later phases complete
    // on the first capture.
    let driver = Arc::new(MockDriver::completing(&[
        "here is the fun",
        "done\nResponse completed\nMade changes.",
    ]));
    let mut fx = fixture(dir.path(), 1, driver.clone(), MockScanner::clean());

    let outcome = fx.orchestrator.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Done);

    // One extra submission and exactly one input clear for the retry
    assert_eq!(driver.submits.load(Ordering::SeqCst), 3);
    assert_eq!(driver.clears.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn never_completing_response_records_failed_round() {
    let dir = tempdir().unwrap();
    let driver = Arc::new(MockDriver::always("still typing and never finish"));
    // Finite ceiling so the elicitation gives up instead of retrying forever
    let mut fx = fixture_with_retry(dir.path(), 1, driver, MockScanner::clean(), Some(1));

    let outcome = fx.orchestrator.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Done);

    let key = FunctionKey::new("app.py", "event");
    let row = fx.orchestrator.tracker().table().row(&key).unwrap();
    assert_eq!(row.cells[0], RoundCell::Failed);
    assert_eq!(row.disposition, Some(Disposition::Inconclusive));
}
