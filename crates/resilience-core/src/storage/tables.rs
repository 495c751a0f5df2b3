//! CSV input tables.
//!
//! - **Historical prior table**: one column per root variable, one sample per row.
//! - **Expert elicitation table**: `Node, Condition, State, <expert ids...>`,
//!   where `Condition` is a literal index list such as `[0, 1]` and a blank
//!   expert cell means no opinion.
//! - **Expert weighting table**: `Expert, <sub-scores...>`.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::engine::elicitation::ElicitationItem;
use crate::engine::errors::ResilienceError;
use crate::engine::fuzzy::ExpertPanel;
use crate::engine::prior::PriorTable;

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source)
}

fn csv_error(table: &str, err: csv::Error) -> ResilienceError {
    ResilienceError::Format(format!("{} table: {}", table, err))
}

fn open(path: &Path) -> Result<std::fs::File, ResilienceError> {
    std::fs::File::open(path).map_err(|e| ResilienceError::io(path, e))
}

pub fn read_prior_table<R: Read>(source: R) -> Result<PriorTable, ResilienceError> {
    let mut rdr = reader(source);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error("prior", e))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in rdr.records() {
        let record = result.map_err(|e| csv_error("prior", e))?;
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            column.push(cell.to_string());
        }
    }

    let mut table = PriorTable::new();
    for (name, cells) in headers.into_iter().zip(columns) {
        if !name.is_empty() {
            table.insert_column(name, cells);
        }
    }
    Ok(table)
}

pub fn load_prior_table(path: impl AsRef<Path>) -> Result<PriorTable, ResilienceError> {
    read_prior_table(open(path.as_ref())?)
}

/// Parses a condition literal: `[0, 1]`, `[]`, or a blank cell for root nodes.
pub fn parse_condition(text: &str) -> Result<Vec<usize>, ResilienceError> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>().map_err(|_| {
                ResilienceError::Format(format!("invalid condition literal '{}'", text))
            })
        })
        .collect()
}

pub fn read_elicitation_table<R: Read>(source: R) -> Result<Vec<ElicitationItem>, ResilienceError> {
    let mut rdr = reader(source);
    let headers = rdr.headers().map_err(|e| csv_error("elicitation", e))?.clone();
    if headers.len() < 3 {
        return Err(ResilienceError::Format(
            "elicitation table needs Node, Condition, State and expert columns".into(),
        ));
    }
    let experts: Vec<String> = headers.iter().skip(3).map(str::to_string).collect();

    let mut items = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error("elicitation", e))?;
        let node = record.get(0).unwrap_or_default();
        if node.is_empty() {
            continue;
        }
        let condition = parse_condition(record.get(1).unwrap_or_default())?;
        let state_cell = record.get(2).unwrap_or_default();
        let state = state_cell.parse::<usize>().map_err(|_| {
            ResilienceError::Format(format!(
                "elicitation row {}: invalid state index '{}'",
                row + 2,
                state_cell
            ))
        })?;
        let grades = experts
            .iter()
            .enumerate()
            .filter_map(|(i, expert)| {
                let cell = record.get(i + 3)?;
                (!cell.is_empty()).then(|| (expert.clone(), cell.to_string()))
            })
            .collect();
        items.push(ElicitationItem {
            node: node.to_string(),
            condition,
            state,
            grades,
        });
    }
    debug!(items = items.len(), experts = experts.len(), "read elicitation table");
    Ok(items)
}

pub fn load_elicitation_table(path: impl AsRef<Path>) -> Result<Vec<ElicitationItem>, ResilienceError> {
    read_elicitation_table(open(path.as_ref())?)
}

/// Reads the weighting table; blank sub-scores count as 0.
pub fn read_expert_panel<R: Read>(source: R) -> Result<ExpertPanel, ResilienceError> {
    let mut rdr = reader(source);
    let mut rows = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error("weighting", e))?;
        let Some(id) = record.get(0).filter(|id| !id.is_empty()) else {
            continue;
        };
        let scores = record
            .iter()
            .skip(1)
            .filter(|cell| !cell.is_empty())
            .map(|cell| {
                cell.parse::<f64>().map_err(|_| {
                    ResilienceError::Format(format!(
                        "weighting row {}: invalid score '{}'",
                        row + 2,
                        cell
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push((id.to_string(), scores));
    }
    ExpertPanel::from_scores(rows)
}

pub fn load_expert_panel(path: impl AsRef<Path>) -> Result<ExpertPanel, ResilienceError> {
    read_expert_panel(open(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_columns_skip_blank_cells() {
        let csv = "roadLoss,responseDuration\nLoss,12.5\nNot_Loss,\n,40\n";
        let table = read_prior_table(csv.as_bytes()).unwrap();
        assert_eq!(table.column("roadLoss").unwrap(), &["Loss", "Not_Loss"]);
        assert_eq!(table.column("responseDuration").unwrap(), &["12.5", "40"]);
    }

    #[test]
    fn condition_literals() {
        assert_eq!(parse_condition("[0, 1]").unwrap(), vec![0, 1]);
        assert_eq!(parse_condition("[]").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_condition("").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_condition("2,3").unwrap(), vec![2, 3]);
        assert!(parse_condition("[a]").is_err());
    }

    #[test]
    fn elicitation_rows_keep_only_given_grades() {
        let csv = "Node,Condition,State,e1,e2,e3\n\
                   AbsorptionCapacity,\"[0, 1]\",0,H,,M\n\
                   AbsorptionCapacity,\"[1, 1]\",0,VH,VH,\n";
        let items = read_elicitation_table(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].condition, vec![0, 1]);
        assert_eq!(
            items[0].grades,
            vec![("e1".to_string(), "H".to_string()), ("e3".to_string(), "M".to_string())]
        );
        assert_eq!(items[1].grades.len(), 2);
    }

    #[test]
    fn weighting_rows_sum_sub_scores() {
        let csv = "Expert,Title,Experience\ne1,3,5\ne2,1,1\n";
        let panel = read_expert_panel(csv.as_bytes()).unwrap();
        assert!((panel.weight("e1").unwrap() - 0.8).abs() < 1e-12);
        assert!((panel.weight("e2").unwrap() - 0.2).abs() < 1e-12);
        assert!(read_expert_panel("Expert,Score\ne1,x\n".as_bytes()).is_err());
    }
}
