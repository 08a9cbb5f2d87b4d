//! Report exporters: delimited-text tables and LaTeX table fragments.
//!
//! Renderers are pure functions over loaded log maps. Column and row order
//! follow the iteration order of the input, which itself follows the
//! matrix declaration order; nothing here re-sorts. Missing summaries
//! render as an explicit placeholder so every row keeps the full column
//! count.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::info;

use omx_core::{ErrorInfo, OmxError, RunRecord, Summary};

use crate::aggregate::{GroupedScenarioTable, ScenarioTable, ValidationLog};
use crate::store::RunLogStore;
use crate::{obs_types, sweeps, validation, variants};

fn csv_to_string(rows: &[Vec<String>]) -> Result<String, OmxError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        writer
            .write_record(row)
            .map_err(|err| OmxError::Serde(ErrorInfo::new("report-csv-row", err.to_string())))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| OmxError::Serde(ErrorInfo::new("report-csv-flush", err.to_string())))?;
    String::from_utf8(bytes)
        .map_err(|err| OmxError::Serde(ErrorInfo::new("report-csv-utf8", err.to_string())))
}

fn csv_cell(summary: &Summary) -> String {
    match summary.min_max_avg {
        Some(stats) => format!("{:.3}", stats.avg()),
        None => "-".to_string(),
    }
}

fn latex_cell(summary: &Summary) -> String {
    match summary.min_max_avg {
        Some(stats) => format!("${:.3}$", stats.avg()),
        None => "$-$".to_string(),
    }
}

fn lookup_cell(table: &ScenarioTable, scenario: &str) -> Summary {
    table
        .get(scenario)
        .map(|log| log.summary)
        .unwrap_or_else(Summary::no_data)
}

fn scenario_names<'a, I>(tables: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ScenarioTable>,
{
    tables
        .into_iter()
        .next()
        .map(|table| table.keys().cloned().collect())
        .unwrap_or_default()
}

fn classification_counts(runs: &IndexMap<usize, RunRecord>, positive: bool) -> (usize, usize) {
    if positive {
        let hits = runs
            .values()
            .filter(|run| run.is_included == Some(true))
            .count();
        (hits, runs.len() - hits)
    } else {
        let hits = runs.values().filter(|run| !run.is_matching).count();
        (hits, runs.len() - hits)
    }
}

/// Renders the positive/negative classification table.
pub fn classification_csv(all: &IndexMap<String, ValidationLog>) -> Result<String, OmxError> {
    let mut rows = vec![vec![
        "modelname".to_string(),
        "true_pos".to_string(),
        "false_pos".to_string(),
        "true_neg".to_string(),
        "false_neg".to_string(),
    ]];
    for (model, log) in all {
        let (true_pos, false_pos) = classification_counts(&log.positives, true);
        let (true_neg, false_neg) = classification_counts(&log.negatives, false);
        rows.push(vec![
            model.clone(),
            true_pos.to_string(),
            false_pos.to_string(),
            true_neg.to_string(),
            false_neg.to_string(),
        ]);
    }
    csv_to_string(&rows)
}

/// Renders a one-level scenario table (observation types or sweep values
/// as columns).
pub fn scenario_table_csv(all: &IndexMap<String, ScenarioTable>) -> Result<String, OmxError> {
    let names = scenario_names(all.values());
    let mut header = vec!["modelname".to_string()];
    header.extend(names.iter().map(|name| name.replace('+', "")));
    let mut rows = vec![header];
    for (model, table) in all {
        let mut row = vec![model.clone()];
        row.extend(names.iter().map(|name| csv_cell(&lookup_cell(table, name))));
        rows.push(row);
    }
    csv_to_string(&rows)
}

/// Renders a two-level scenario table (matcher variants as columns, one
/// row per model and observation type).
pub fn grouped_table_csv(all: &IndexMap<String, GroupedScenarioTable>) -> Result<String, OmxError> {
    let names = scenario_names(all.values().flat_map(|grouped| grouped.values()));
    let mut header = vec!["modelname".to_string(), "obs_type".to_string()];
    header.extend(names.iter().map(|name| name.replace('+', "")));
    let mut rows = vec![header];
    for (model, grouped) in all {
        for (obs_type, table) in grouped {
            let mut row = vec![model.clone(), obs_type.clone()];
            row.extend(names.iter().map(|name| csv_cell(&lookup_cell(table, name))));
            rows.push(row);
        }
    }
    csv_to_string(&rows)
}

/// Renders the one-level LaTeX fragment: one row per model, terminated
/// with a row separator and rule.
pub fn scenario_table_latex(all: &IndexMap<String, ScenarioTable>) -> String {
    let names = scenario_names(all.values());
    let width = all
        .keys()
        .map(|model| format!("\\texttt{{{model}}}").len())
        .max()
        .unwrap_or(0);
    let lines: Vec<String> = all
        .iter()
        .map(|(model, table)| {
            let first = format!("\\texttt{{{model}}}");
            let mut cells = vec![format!("{first:<width$}")];
            cells.extend(names.iter().map(|name| latex_cell(&lookup_cell(table, name))));
            format!("{} \\\\\\hline", cells.join(" & "))
        })
        .collect();
    lines.join("\n")
}

/// Renders the two-level LaTeX fragment: rows grouped per model with a
/// row-spanning first cell, a rule after each model block.
pub fn grouped_table_latex(all: &IndexMap<String, GroupedScenarioTable>) -> String {
    let names = scenario_names(all.values().flat_map(|grouped| grouped.values()));
    let width = all
        .iter()
        .map(|(model, grouped)| multirow_cell(model, grouped.len()).len())
        .max()
        .unwrap_or(0);

    let blocks: Vec<String> = all
        .iter()
        .map(|(model, grouped)| {
            let first = multirow_cell(model, grouped.len());
            let rows: Vec<String> = grouped
                .iter()
                .enumerate()
                .map(|(row_idx, (obs_type, table))| {
                    let lead = if row_idx == 0 {
                        format!("{first:<width$}")
                    } else {
                        " ".repeat(width)
                    };
                    let mut cells = vec![lead, format!("\\texttt{{{}}}", obs_type.replace('-', ","))];
                    cells.extend(names.iter().map(|name| latex_cell(&lookup_cell(table, name))));
                    format!("{} \\\\", cells.join(" & "))
                })
                .collect();
            format!("{}\\hline", rows.join("\n"))
        })
        .collect();
    blocks.join("\n")
}

fn multirow_cell(model: &str, span: usize) -> String {
    format!("\\multirow{{{span}}}*{{\\texttt{{{model}}}}}")
}

fn write_report(path: &Path, contents: &str) -> Result<(), OmxError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("report-mkdir", err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    fs::write(path, contents).map_err(|err| {
        OmxError::Serde(
            ErrorInfo::new("report-write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    info!(path = %path.display(), "report saved");
    Ok(())
}

/// Writes the classification table from persisted validation logs.
pub fn write_validation_report(
    store: &RunLogStore,
    out_root: &Path,
) -> Result<Vec<PathBuf>, OmxError> {
    let all: IndexMap<String, ValidationLog> =
        RunLogStore::load_all(&store.subdir(validation::SUBDIR))?;
    let path = out_root
        .join(validation::SUBDIR)
        .join("exp1_data_table.csv");
    write_report(&path, &classification_csv(&all)?)?;
    Ok(vec![path])
}

/// Writes the matcher-variant comparison table and LaTeX fragment.
pub fn write_variant_report(
    store: &RunLogStore,
    out_root: &Path,
) -> Result<Vec<PathBuf>, OmxError> {
    let all: IndexMap<String, GroupedScenarioTable> =
        RunLogStore::load_all(&store.subdir(variants::SUBDIR))?;
    let dir = out_root.join(variants::SUBDIR);
    let csv_path = dir.join("exp2_data_table.csv");
    write_report(&csv_path, &grouped_table_csv(&all)?)?;
    let tex_path = dir.join("exp2_latex_table_data.tex");
    write_report(&tex_path, &grouped_table_latex(&all))?;
    Ok(vec![csv_path, tex_path])
}

/// Writes the observation-type comparison table and LaTeX fragment.
pub fn write_obs_type_report(
    store: &RunLogStore,
    out_root: &Path,
) -> Result<Vec<PathBuf>, OmxError> {
    let all: IndexMap<String, ScenarioTable> =
        RunLogStore::load_all(&store.subdir(obs_types::SUBDIR))?;
    let dir = out_root.join(obs_types::SUBDIR);
    let csv_path = dir.join("exp3_data_table.csv");
    write_report(&csv_path, &scenario_table_csv(&all)?)?;
    let tex_path = dir.join("exp3_latex_table_data.tex");
    write_report(&tex_path, &scenario_table_latex(&all))?;
    Ok(vec![csv_path, tex_path])
}

/// Writes the sweep tables for observation sizes and extents.
pub fn write_sweep_reports(
    store: &RunLogStore,
    out_root: &Path,
) -> Result<Vec<PathBuf>, OmxError> {
    let dir = out_root.join("exp_obs_size_obs_extents");
    let mut written = Vec::new();
    for (subdir, file) in [
        (sweeps::SIZES_SUBDIR, "exp4_data_table.csv"),
        (sweeps::EXTENTS_SUBDIR, "exp5_data_table.csv"),
    ] {
        let all: IndexMap<String, ScenarioTable> = RunLogStore::load_all(&store.subdir(subdir))?;
        let path = dir.join(file);
        write_report(&path, &scenario_table_csv(&all)?)?;
        written.push(path);
    }
    Ok(written)
}
