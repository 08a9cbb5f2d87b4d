use indexmap::IndexMap;

use omx_core::{MinMaxAvg, RunRecord, Summary};
use omx_exp::aggregate::{GroupedScenarioTable, ScenarioLog, ScenarioTable, ValidationLog};
use omx_exp::report::{
    classification_csv, grouped_table_csv, grouped_table_latex, scenario_table_csv,
    scenario_table_latex,
};

fn summarized(min: f64, max: f64, avg: f64) -> ScenarioLog {
    ScenarioLog {
        runs: None,
        summary: Summary {
            min_max_avg: Some(MinMaxAvg(min, max, avg)),
        },
    }
}

fn no_data() -> ScenarioLog {
    ScenarioLog::absent()
}

fn single_model_table() -> IndexMap<String, ScenarioTable> {
    let mut table = ScenarioTable::new();
    table.insert("few-short".to_string(), summarized(0.1, 0.3, 0.2));
    IndexMap::from_iter([("modelA".to_string(), table)])
}

#[test]
fn tabular_report_renders_header_and_three_decimal_averages() {
    let csv = scenario_table_csv(&single_model_table()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("modelname;few-short"));
    assert_eq!(lines.next(), Some("modelA;0.200"));
    assert!(lines.next().is_none());
}

#[test]
fn missing_summaries_render_as_placeholders_never_blank() {
    let mut table = ScenarioTable::new();
    table.insert("few-short".to_string(), no_data());
    table.insert("many-long".to_string(), summarized(1.0, 1.0, 1.0));
    let all = IndexMap::from_iter([("modelA".to_string(), table)]);

    let csv = scenario_table_csv(&all).unwrap();
    assert!(csv.lines().any(|line| line == "modelA;-;1.000"));

    let latex = scenario_table_latex(&all);
    assert!(latex.contains("$-$"));
    assert!(latex.contains("$1.000$"));
}

#[test]
fn rows_keep_the_full_column_count_when_a_scenario_is_absent() {
    let mut complete = ScenarioTable::new();
    complete.insert("few-short".to_string(), summarized(0.1, 0.3, 0.2));
    complete.insert("many-long".to_string(), summarized(0.2, 0.6, 0.4));
    let mut sparse = ScenarioTable::new();
    sparse.insert("few-short".to_string(), summarized(0.5, 0.5, 0.5));
    let all = IndexMap::from_iter([
        ("modelA".to_string(), complete),
        ("modelB".to_string(), sparse),
    ]);

    let csv = scenario_table_csv(&all).unwrap();
    for line in csv.lines() {
        assert_eq!(line.split(';').count(), 3, "short row in: {line}");
    }
    assert!(csv.lines().any(|line| line == "modelB;0.500;-"));
}

#[test]
fn column_order_follows_input_order_without_sorting() {
    let mut table = ScenarioTable::new();
    table.insert("zeta".to_string(), summarized(0.1, 0.1, 0.1));
    table.insert("alpha".to_string(), summarized(0.2, 0.2, 0.2));
    let all = IndexMap::from_iter([("m".to_string(), table)]);

    let csv = scenario_table_csv(&all).unwrap();
    assert_eq!(csv.lines().next(), Some("modelname;zeta;alpha"));
}

#[test]
fn latex_rows_are_rule_terminated_and_math_mode() {
    let latex = scenario_table_latex(&single_model_table());
    assert_eq!(latex, "\\texttt{modelA} & $0.200$ \\\\\\hline");
}

#[test]
fn grouped_csv_strips_reserved_plus_from_scenario_names() {
    let mut variants = ScenarioTable::new();
    variants.insert("B+P".to_string(), summarized(0.1, 0.1, 0.1));
    variants.insert("B+S+C".to_string(), no_data());
    let mut grouped = GroupedScenarioTable::new();
    grouped.insert("few-short".to_string(), variants);
    let all = IndexMap::from_iter([("modelA".to_string(), grouped)]);

    let csv = grouped_table_csv(&all).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("modelname;obs_type;BP;BSC"));
    assert_eq!(lines.next(), Some("modelA;few-short;0.100;-"));
}

#[test]
fn grouped_latex_spans_the_model_cell_over_its_rows() {
    let mut first = ScenarioTable::new();
    first.insert("B".to_string(), summarized(0.1, 0.1, 0.1));
    let mut second = ScenarioTable::new();
    second.insert("B".to_string(), no_data());
    let mut grouped = GroupedScenarioTable::new();
    grouped.insert("few-short".to_string(), first);
    grouped.insert("many-long".to_string(), second);
    let all = IndexMap::from_iter([("modelA".to_string(), grouped)]);

    let latex = grouped_table_latex(&all);
    let lines: Vec<&str> = latex.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("\\multirow{2}*{\\texttt{modelA}}"));
    assert!(lines[0].contains("\\texttt{few,short}"));
    assert!(lines[0].ends_with(" \\\\"));
    assert!(lines[1].starts_with("  "));
    assert!(lines[1].contains("\\texttt{many,long}"));
    assert!(lines[1].contains("$-$"));
    assert!(lines[1].ends_with(" \\\\\\hline"));
}

#[test]
fn classification_table_counts_by_inclusion_and_matching() {
    fn record(matching: bool, included: Option<bool>) -> RunRecord {
        let mut record = RunRecord::empty();
        record.is_matching = matching;
        record.is_included = included;
        record
    }

    let positives: IndexMap<usize, RunRecord> = IndexMap::from_iter([
        (0, record(true, Some(true))),
        (1, record(true, Some(true))),
        (2, record(true, Some(false))),
    ]);
    let negatives: IndexMap<usize, RunRecord> =
        IndexMap::from_iter([(0, record(false, None)), (1, record(true, None))]);
    let all = IndexMap::from_iter([(
        "modelA".to_string(),
        ValidationLog {
            positives,
            negatives,
        },
    )]);

    let csv = classification_csv(&all).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("modelname;true_pos;false_pos;true_neg;false_neg")
    );
    assert_eq!(lines.next(), Some("modelA;2;1;1;1"));
}
