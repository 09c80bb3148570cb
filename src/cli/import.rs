use std::io::Read;
use std::path::Path;

use chrono::Utc;
use comfy_table::Table;
use rusqlite::Connection;

use crate::analyzer::{analyze, ValueKind};
use crate::db::{category_directory, default_user_id, get_connection, source_directory};
use crate::error::{FlowbookError, Result};
use crate::fmt::money;
use crate::models::ImportSummary;
use crate::processor::{self, ImportRequest, TransformOutcome};
use crate::reader::{read_clipboard, read_file, Grid};
use crate::session::{
    default_session_root, ImportSession, SessionMeta, SessionPayload, SessionStore,
};
use crate::settings::get_data_dir;

pub fn file(path: &str) -> Result<()> {
    let grid = read_file(Path::new(path))?;
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string());
    open_session("file", file_name, grid)
}

pub fn paste(file: Option<String>) -> Result<()> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let grid = read_clipboard(&content)?;
    if grid.total_rows == 0 {
        return Err(FlowbookError::EmptyPaste);
    }
    open_session("clipboard", None, grid)
}

pub fn preview(session_id: &str, mapping_path: &str) -> Result<()> {
    let (conn, user_id, store) = open_context()?;
    let (session, request) = load_session_and_request(&store, user_id, session_id, mapping_path)?;

    let categories = category_directory(&conn, user_id)?;
    let sources = source_directory(&conn, user_id)?;
    let outcome = processor::transform(
        &conn,
        user_id,
        &session.payload,
        &request,
        &categories,
        &sources,
    )?;

    print_outcome(&outcome);
    if !outcome.errors.is_empty() {
        return Err(FlowbookError::Other(format!(
            "{} row(s) could not be resolved.",
            outcome.errors.len()
        )));
    }
    println!(
        "\nDry run only; `flowbook import commit --session {session_id} --mapping {mapping_path}` to persist."
    );
    Ok(())
}

pub fn commit(session_id: &str, mapping_path: &str) -> Result<()> {
    let (mut conn, user_id, store) = open_context()?;
    let (session, request) = load_session_and_request(&store, user_id, session_id, mapping_path)?;

    let categories = category_directory(&conn, user_id)?;
    let sources = source_directory(&conn, user_id)?;
    let outcome = processor::commit(
        &mut conn,
        user_id,
        &session.payload,
        &request,
        &categories,
        &sources,
    )?;

    if !outcome.errors.is_empty() {
        print_errors(&outcome);
        return Err(FlowbookError::Other(format!(
            "{} row(s) could not be resolved; nothing was committed.",
            outcome.errors.len()
        )));
    }

    // The session is spent once its rows are in the ledger.
    store.delete(user_id, session_id)?;

    print_summary(&outcome.summary);
    println!("Imported {} transaction(s).", outcome.summary.count);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_context() -> Result<(Connection, i64, SessionStore)> {
    let data_dir = get_data_dir();
    let conn = get_connection(&data_dir.join("flowbook.db"))?;
    let user_id = default_user_id(&conn)?;
    let store = SessionStore::new(default_session_root(&data_dir));
    Ok((conn, user_id, store))
}

fn load_session_and_request(
    store: &SessionStore,
    user_id: i64,
    session_id: &str,
    mapping_path: &str,
) -> Result<(ImportSession, ImportRequest)> {
    let session = store
        .get(user_id, session_id, Utc::now())?
        .ok_or(FlowbookError::SessionNotFound)?;
    let content = std::fs::read_to_string(mapping_path)?;
    let request: ImportRequest = serde_json::from_str(&content)
        .map_err(|e| FlowbookError::InvalidMapping(e.to_string()))?;
    Ok((session, request))
}

fn open_session(source: &str, file_name: Option<String>, grid: Grid) -> Result<()> {
    let (_conn, user_id, store) = open_context()?;

    let analysis = analyze(&grid.rows, grid.total_columns);
    let payload = SessionPayload::from_analysis(
        SessionMeta {
            source: source.to_string(),
            file_name,
            total_rows: grid.total_rows,
            total_columns: grid.total_columns,
        },
        analysis,
    );
    let session = store.create(user_id, payload, Utc::now())?;

    println!(
        "Opened import session {} ({} rows, {} columns)",
        session.id, session.payload.meta.total_rows, session.payload.meta.total_columns
    );

    let mut table = Table::new();
    table.set_header(vec!["Col", "Header guess", "Types", "Samples"]);
    for column in &session.payload.analysis.columns {
        let samples = column
            .sample_values
            .iter()
            .take(3)
            .map(|v| v.display())
            .collect::<Vec<_>>()
            .join(" | ");
        table.add_row(vec![
            column.label.clone(),
            column.header_guess.clone().unwrap_or_default(),
            kinds_label(&column.detected_types),
            samples,
        ]);
    }
    println!("{table}");

    if let Some(&best) = session.payload.analysis.header_candidates.first() {
        println!("Likely header row: {best}");
    }
    let range = &session.payload.analysis.detected_date_range;
    if let (Some(min), Some(max)) = (range.min, range.max) {
        println!("Detected date range: {min} to {max}");
    }
    let skipped = session
        .payload
        .rows
        .iter()
        .filter(|r| r.auto_skip)
        .count();
    if skipped > 0 {
        println!("{skipped} row(s) look like headers/summaries and will be skipped.");
    }

    println!(
        "\nNext: write a mapping JSON and run `flowbook import preview --session {} --mapping mapping.json`.",
        session.id
    );
    Ok(())
}

fn kinds_label(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(|k| match k {
            ValueKind::Date => "date",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_outcome(outcome: &TransformOutcome) {
    if !outcome.rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            "Row", "Date", "Description", "Amount", "Type", "Category", "Source",
        ]);
        for row in &outcome.rows {
            table.add_row(vec![
                row.original_row_number.to_string(),
                row.transaction_date.to_string(),
                row.description.clone(),
                money(row.amount),
                row.txn_type.as_str().to_string(),
                row.category_name.clone().unwrap_or_default(),
                row.cash_flow_source_name.clone().unwrap_or_default(),
            ]);
        }
        println!("{table}");
    }

    print_errors(outcome);
    print_summary(&outcome.summary);
}

fn print_errors(outcome: &TransformOutcome) {
    if outcome.errors.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Row", "Field", "Problem"]);
    for error in &outcome.errors {
        table.add_row(vec![
            error.row_index.to_string(),
            error.field.to_string(),
            error.message.clone(),
        ]);
    }
    println!("Unresolved rows\n{table}");
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "{} row(s): income {} / expenses {}",
        summary.count,
        money(summary.income_total),
        money(summary.expense_total)
    );
    if let (Some(min), Some(max)) = (summary.date_range.min, summary.date_range.max) {
        println!("Dates {min} to {max} ({})", summary.months.join(", "));
    }
}
