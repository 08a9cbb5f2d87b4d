use indexmap::IndexMap;

use omx_core::{RunRecord, PHASE_MATCHING};
use omx_exp::aggregate::ScenarioLog;
use omx_exp::store::RunLogStore;

fn record(duration: f64, matching: bool) -> RunRecord {
    let mut record = RunRecord::empty();
    record
        .durations
        .insert(PHASE_MATCHING.to_string(), duration);
    record.is_matching = matching;
    record
}

fn scenario(durations: &[f64]) -> ScenarioLog {
    let runs: IndexMap<usize, RunRecord> = durations
        .iter()
        .enumerate()
        .map(|(idx, &d)| (idx, record(d, true)))
        .collect();
    ScenarioLog::from_records(runs)
}

#[test]
fn files_sort_in_execution_order_and_merge_in_that_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = RunLogStore::new(dir.path());

    store
        .append("exp9_order", "exp9", 2, "beta", &scenario(&[0.2]))
        .unwrap();
    store
        .append("exp9_order", "exp9", 1, "alpha", &scenario(&[0.1]))
        .unwrap();
    store
        .append("exp9_order", "exp9", 10, "gamma", &scenario(&[0.3]))
        .unwrap();

    let all: IndexMap<String, ScenarioLog> =
        RunLogStore::load_all(&store.subdir("exp9_order")).unwrap();
    let order: Vec<&str> = all.keys().map(String::as_str).collect();
    assert_eq!(order, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn reloaded_records_rederive_the_same_summary() {
    let dir = tempfile::tempdir().unwrap();
    let store = RunLogStore::new(dir.path());
    let log = scenario(&[0.1, 0.3, 0.2]);
    let in_memory_summary = log.summary;

    store
        .append("exp9_roundtrip", "exp9", 1, "counter", &log)
        .unwrap();
    let all: IndexMap<String, ScenarioLog> =
        RunLogStore::load_all(&store.subdir("exp9_roundtrip")).unwrap();
    let reloaded = &all["counter"];

    assert_eq!(reloaded.summary, in_memory_summary);
    assert_eq!(reloaded.rederive_summary(), in_memory_summary);
}

#[test]
fn key_collisions_let_later_files_win_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let store = RunLogStore::new(dir.path());

    store
        .append("exp9_collide", "exp9", 1, "twin", &scenario(&[0.1]))
        .unwrap();
    store
        .append("exp9_collide", "exp9", 2, "twin", &scenario(&[0.9]))
        .unwrap();

    let all: IndexMap<String, ScenarioLog> =
        RunLogStore::load_all(&store.subdir("exp9_collide")).unwrap();
    assert_eq!(all.len(), 1);
    let stats = all["twin"].summary.min_max_avg.unwrap();
    assert_eq!(stats.avg(), 0.9);
}

#[test]
fn contains_reports_only_complete_logs() {
    let dir = tempfile::tempdir().unwrap();
    let store = RunLogStore::new(dir.path());
    assert!(!store.contains("exp9_done", "exp9", 1, "counter"));
    store
        .append("exp9_done", "exp9", 1, "counter", &scenario(&[0.5]))
        .unwrap();
    assert!(store.contains("exp9_done", "exp9", 1, "counter"));
    assert!(!store.contains("exp9_done", "exp9", 2, "counter"));
}

#[test]
fn non_log_files_are_ignored_by_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let store = RunLogStore::new(dir.path());
    store
        .append("exp9_mixed", "exp9", 1, "counter", &scenario(&[0.5]))
        .unwrap();
    std::fs::write(store.subdir("exp9_mixed").join("manifest.json"), "{}").unwrap();

    let all: IndexMap<String, ScenarioLog> =
        RunLogStore::load_all(&store.subdir("exp9_mixed")).unwrap();
    assert_eq!(all.len(), 1);
}
