use std::collections::{HashMap, HashSet};

use chrono::Datelike;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::budgets::{recompute_category_budget, recompute_source_budget};
use crate::error::Result;
use crate::models::{
    round2, CashFlowSource, Category, DateRange, ImportSummary, RowError, TransformedRow, TxnType,
};
use crate::parser::{
    resolve_amount, resolve_date, resolve_type, ColumnMapping, ColumnRef, DateMapping,
};
use crate::reader::Cell;
use crate::session::SessionPayload;

/// Suggestion lookups never consider more than this many distinct
/// descriptions per batch.
const SUGGESTION_DESCRIPTION_LIMIT: usize = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowAssignment {
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub cash_flow_source_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportDefaults {
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub cash_flow_source_id: Option<i64>,
}

/// Everything the caller declares about one import batch: the column
/// mapping plus row-level exclusions and assignments. Row assignment
/// keys are stringified row indices, matching the JSON wire shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub header_row_index: Option<usize>,
    #[serde(default)]
    pub excluded_rows: Vec<usize>,
    #[serde(default)]
    pub defaults: ImportDefaults,
    #[serde(default)]
    pub row_assignments: HashMap<String, RowAssignment>,
}

#[derive(Debug, Serialize)]
pub struct TransformOutcome {
    pub rows: Vec<TransformedRow>,
    pub errors: Vec<RowError>,
    pub summary: ImportSummary,
    pub header_candidates: Vec<usize>,
    pub detected_date_range: DateRange,
}

struct Suggestions {
    categories: HashMap<String, i64>,
    sources: HashMap<String, i64>,
}

/// Dry run: turn an analyzed session into persistable rows plus per-row
/// errors. Never writes; callable any number of times with different
/// requests against the same session.
pub fn transform(
    conn: &Connection,
    user_id: i64,
    payload: &SessionPayload,
    request: &ImportRequest,
    categories: &HashMap<i64, Category>,
    sources: &HashMap<i64, CashFlowSource>,
) -> Result<TransformOutcome> {
    let mut excluded: HashSet<usize> = request.excluded_rows.iter().copied().collect();
    if let Some(header) = request.header_row_index {
        excluded.insert(header);
    }

    let suggestions = build_suggestions(
        conn,
        user_id,
        payload,
        &request.mapping,
        categories,
        sources,
    )?;

    let date_column = match &request.mapping.date {
        DateMapping::Column { column, .. } => *column,
        _ => None,
    };

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for row in &payload.rows {
        if excluded.contains(&row.index) {
            continue;
        }
        let values = &row.values;

        let date = match resolve_date(values, &request.mapping.date, None) {
            Ok(date) => date,
            Err(message) => {
                if should_silently_skip(row, values, date_column) {
                    continue;
                }
                errors.push(row_error(row.index, "date", message, values));
                continue;
            }
        };

        let (amount, direction) = match resolve_amount(values, &request.mapping.amount) {
            Ok(resolved) => resolved,
            Err(message) => {
                errors.push(row_error(row.index, "amount", message, values));
                continue;
            }
        };

        let txn_type = match resolve_type(values, &request.mapping.txn_type, Some(direction)) {
            Ok(txn_type) => txn_type,
            Err(message) => {
                errors.push(row_error(row.index, "type", message, values));
                continue;
            }
        };

        let posting_date =
            match resolve_date(values, &request.mapping.posting_date, Some(date)) {
                Ok(date) => date,
                Err(message) => {
                    let posting_column = match &request.mapping.posting_date {
                        DateMapping::Column { column, .. } => *column,
                        _ => None,
                    };
                    if posting_column.is_some()
                        && should_silently_skip(row, values, posting_column)
                    {
                        continue;
                    }
                    errors.push(row_error(row.index, "posting_date", message, values));
                    continue;
                }
            };

        let Some(description) = text_from_column(values, Some(&request.mapping.description))
        else {
            errors.push(row_error(
                row.index,
                "description",
                "A description is required for every row.".to_string(),
                values,
            ));
            continue;
        };

        let reference_number = value_from_column(values, request.mapping.reference.as_ref());
        let notes = value_from_column(values, request.mapping.notes.as_ref());

        let suggestion_key = description.to_lowercase();
        let assignment = request.row_assignments.get(&row.index.to_string());

        let category_id = assignment
            .and_then(|a| a.category_id)
            .or(request.defaults.category_id)
            .or_else(|| suggestions.categories.get(&suggestion_key).copied());
        let source_id = assignment
            .and_then(|a| a.cash_flow_source_id)
            .or(request.defaults.cash_flow_source_id)
            .or_else(|| suggestions.sources.get(&suggestion_key).copied());
        let notes = assignment.and_then(|a| a.notes.clone()).or(notes);

        // Unknown ids resolve to no assignment rather than an error;
        // the user confirms assignments in the preview anyway.
        let category = category_id.and_then(|id| categories.get(&id));
        let source = source_id.and_then(|id| sources.get(&id));

        if let Some(category) = category {
            if !category.category_type.accepts(txn_type) {
                errors.push(row_error(
                    row.index,
                    "category_id",
                    "The selected category does not match the cash-flow type.".to_string(),
                    values,
                ));
                continue;
            }
        }

        if let Some(source) = source {
            if !source.allows_refunds && source.source_type != txn_type {
                errors.push(row_error(
                    row.index,
                    "cash_flow_source_id",
                    "The selected cash-flow source does not match the cash-flow type."
                        .to_string(),
                    values,
                ));
                continue;
            }
        }

        rows.push(TransformedRow {
            row_index: row.index,
            original_row_number: row.original_index,
            transaction_date: date,
            posting_date,
            description,
            amount: round2(amount),
            txn_type,
            category_id: category.map(|c| c.id),
            category_name: category.map(|c| c.name.clone()),
            cash_flow_source_id: source.map(|s| s.id),
            cash_flow_source_name: source.map(|s| s.name.clone()),
            reference_number,
            notes,
            raw_values: values.clone(),
        });
    }

    let summary = build_summary(&rows);

    Ok(TransformOutcome {
        rows,
        errors,
        summary,
        header_candidates: payload.analysis.header_candidates.clone(),
        detected_date_range: payload.analysis.detected_date_range.clone(),
    })
}

/// Commit: re-run the dry run and, only when it produced zero errors,
/// persist every row and refresh the touched budget cells in a single
/// transaction. An outcome with errors means nothing was written.
pub fn commit(
    conn: &mut Connection,
    user_id: i64,
    payload: &SessionPayload,
    request: &ImportRequest,
    categories: &HashMap<i64, Category>,
    sources: &HashMap<i64, CashFlowSource>,
) -> Result<TransformOutcome> {
    let outcome = transform(conn, user_id, payload, request, categories, sources)?;
    if !outcome.errors.is_empty() {
        return Ok(outcome);
    }

    let tx = conn.transaction()?;

    let mut category_periods: HashSet<(i64, i32, u32)> = HashSet::new();
    let mut source_periods: HashSet<(i64, i32, u32)> = HashSet::new();

    for row in &outcome.rows {
        tx.execute(
            "INSERT INTO transactions
                (user_id, transaction_date, posting_date, description, amount,
                 transaction_type, category_id, cash_flow_source_id,
                 reference_number, notes, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'completed')",
            params![
                user_id,
                row.transaction_date.to_string(),
                row.posting_date.to_string(),
                row.description,
                row.amount,
                row.txn_type.as_str(),
                row.category_id,
                row.cash_flow_source_id,
                row.reference_number,
                row.notes,
            ],
        )?;

        let (year, month) = (row.transaction_date.year(), row.transaction_date.month());
        if let Some(category_id) = row.category_id {
            category_periods.insert((category_id, year, month));
        }
        if let Some(source_id) = row.cash_flow_source_id {
            source_periods.insert((source_id, year, month));
        }
    }

    for (category_id, year, month) in category_periods {
        recompute_category_budget(&tx, user_id, category_id, year, month)?;
    }
    for (source_id, year, month) in source_periods {
        recompute_source_budget(&tx, user_id, source_id, year, month)?;
    }

    tx.commit()?;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A row whose date failed to parse is dropped without an error when
/// the analyzer already flagged it, or when its date cell is digit-free
/// text (header residue, not data).
fn should_silently_skip(
    row: &crate::analyzer::RowInsight,
    values: &[Cell],
    date_column: Option<usize>,
) -> bool {
    if row.auto_skip || row.has_structural_skip_reason() {
        return true;
    }

    if let Some(column) = date_column {
        if let Some(Cell::Text(text)) = values.get(column) {
            let trimmed = text.trim();
            if !trimmed.is_empty() && !trimmed.chars().any(|c| c.is_numeric()) {
                return true;
            }
        }
    }

    false
}

fn value_from_column(values: &[Cell], column_ref: Option<&ColumnRef>) -> Option<String> {
    let column = column_ref.and_then(|r| r.column)?;
    let value = values.get(column)?;
    if value.is_empty() {
        return None;
    }
    let text = value.display().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Like `value_from_column` but only accepts textual cells; a bare
/// number is not a usable description.
fn text_from_column(values: &[Cell], column_ref: Option<&ColumnRef>) -> Option<String> {
    let column = column_ref.and_then(|r| r.column)?;
    match values.get(column)? {
        Cell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

fn row_error(row_index: usize, field: &'static str, message: String, values: &[Cell]) -> RowError {
    RowError {
        row_index,
        field,
        message,
        values: values.to_vec(),
    }
}

fn build_summary(rows: &[TransformedRow]) -> ImportSummary {
    let income_total = rows
        .iter()
        .filter(|r| r.txn_type == TxnType::Income)
        .map(|r| r.amount)
        .sum();
    let expense_total = rows
        .iter()
        .filter(|r| r.txn_type == TxnType::Expense)
        .map(|r| r.amount)
        .sum();

    let mut dates: Vec<_> = rows.iter().map(|r| r.transaction_date).collect();
    dates.sort();

    let mut months = Vec::new();
    for row in rows {
        let month = row.transaction_date.format("%Y-%m").to_string();
        if !months.contains(&month) {
            months.push(month);
        }
    }

    ImportSummary {
        count: rows.len(),
        income_total: round2(income_total),
        expense_total: round2(expense_total),
        date_range: DateRange {
            min: dates.first().copied(),
            max: dates.last().copied(),
        },
        months,
    }
}

/// Mines the user's ledger for the most recent category/source used
/// with each description in the batch. Only active ids survive; stale
/// references drop out because the directories no longer contain them.
fn build_suggestions(
    conn: &Connection,
    user_id: i64,
    payload: &SessionPayload,
    mapping: &ColumnMapping,
    categories: &HashMap<i64, Category>,
    sources: &HashMap<i64, CashFlowSource>,
) -> Result<Suggestions> {
    let empty = Suggestions {
        categories: HashMap::new(),
        sources: HashMap::new(),
    };

    let Some(description_column) = mapping.description.column else {
        return Ok(empty);
    };

    let mut descriptions = Vec::new();
    for row in &payload.rows {
        if descriptions.len() >= SUGGESTION_DESCRIPTION_LIMIT {
            break;
        }
        let Some(Cell::Text(text)) = row.values.get(description_column) else {
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || descriptions.iter().any(|d| d == trimmed) {
            continue;
        }
        descriptions.push(trimmed.to_string());
    }
    if descriptions.is_empty() {
        return Ok(empty);
    }

    // Descriptions match case-insensitively, like the keyed lookup below.
    let placeholders = vec!["?"; descriptions.len()].join(", ");
    let sql = format!(
        "SELECT description, category_id, cash_flow_source_id FROM transactions
         WHERE user_id = ? AND description COLLATE NOCASE IN ({placeholders})
         ORDER BY transaction_date DESC, id DESC"
    );

    let mut sql_params: Vec<rusqlite::types::Value> = vec![user_id.into()];
    sql_params.extend(descriptions.into_iter().map(rusqlite::types::Value::from));

    let mut stmt = conn.prepare(&sql)?;
    let history = stmt.query_map(rusqlite::params_from_iter(sql_params), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<i64>>(1)?,
            row.get::<_, Option<i64>>(2)?,
        ))
    })?;

    let mut category_suggestions = HashMap::new();
    let mut source_suggestions = HashMap::new();
    // History arrives newest first; the first hit per description wins.
    for entry in history {
        let (description, category_id, source_id) = entry?;
        let key = description.trim().to_lowercase();

        if let Some(category_id) = category_id {
            if categories.contains_key(&category_id) {
                category_suggestions.entry(key.clone()).or_insert(category_id);
            }
        }
        if let Some(source_id) = source_id {
            if sources.contains_key(&source_id) {
                source_suggestions.entry(key).or_insert(source_id);
            }
        }
    }

    Ok(Suggestions {
        categories: category_suggestions,
        sources: source_suggestions,
    })
}
