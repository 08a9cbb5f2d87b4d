use criterion::{black_box, criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;

use omx_core::{summarize_records, MinMaxAvg, RunRecord, Summary, PHASE_MATCHING};
use omx_exp::aggregate::{ScenarioLog, ScenarioTable};
use omx_exp::report::scenario_table_csv;

fn sample_records(count: usize) -> Vec<RunRecord> {
    (0..count)
        .map(|idx| {
            let mut record = RunRecord::empty();
            record
                .durations
                .insert(PHASE_MATCHING.to_string(), (idx % 97) as f64 / 97.0);
            record.is_matching = true;
            record
        })
        .collect()
}

fn sample_table(models: usize, scenarios: usize) -> IndexMap<String, ScenarioTable> {
    (0..models)
        .map(|m| {
            let table: ScenarioTable = (0..scenarios)
                .map(|s| {
                    let log = ScenarioLog {
                        runs: None,
                        summary: Summary {
                            min_max_avg: Some(MinMaxAvg(0.1, 0.9, (s as f64) / 10.0)),
                        },
                    };
                    (format!("scenario-{s}"), log)
                })
                .collect();
            (format!("model-{m:02}"), table)
        })
        .collect()
}

fn bench_summarize(c: &mut Criterion) {
    let records = sample_records(10_000);
    c.bench_function("summarize_10k_records", |b| {
        b.iter(|| summarize_records(black_box(&records), PHASE_MATCHING))
    });
}

fn bench_render(c: &mut Criterion) {
    let table = sample_table(50, 20);
    c.bench_function("render_scenario_table_50x20", |b| {
        b.iter(|| scenario_table_csv(black_box(&table)).unwrap())
    });
}

criterion_group!(benches, bench_summarize, bench_render);
criterion_main!(benches);
