use comfy_table::{Cell, Table};

use crate::budgets::{set_category_budget, set_source_budget};
use crate::cli::categories::find_category_id;
use crate::cli::parse_month;
use crate::cli::sources::find_source_id;
use crate::db::{default_user_id, get_connection};
use crate::error::{FlowbookError, Result};
use crate::fmt::money;
use crate::settings::get_data_dir;

pub fn set(
    category: Option<String>,
    source: Option<String>,
    month: &str,
    amount: f64,
) -> Result<()> {
    let (year, month_num) = parse_month(month)?;
    let conn = get_connection(&get_data_dir().join("flowbook.db"))?;
    let user_id = default_user_id(&conn)?;

    match (category, source) {
        (Some(category), None) => {
            let category_id = find_category_id(&conn, user_id, &category)?;
            set_category_budget(&conn, user_id, category_id, year, month_num, amount)?;
            println!("Budget for {category} in {month}: {}", money(amount));
        }
        (None, Some(source)) => {
            let source_id = find_source_id(&conn, user_id, &source)?;
            set_source_budget(&conn, user_id, source_id, year, month_num, amount)?;
            println!("Budget for {source} in {month}: {}", money(amount));
        }
        _ => {
            return Err(FlowbookError::Other(
                "Pass exactly one of --category or --source".into(),
            ));
        }
    }
    Ok(())
}

pub fn list(month: &str) -> Result<()> {
    let (year, month_num) = parse_month(month)?;
    let conn = get_connection(&get_data_dir().join("flowbook.db"))?;
    let user_id = default_user_id(&conn)?;

    let mut stmt = conn.prepare(
        "SELECT c.name, b.planned_amount, b.spent_amount, b.remaining_amount
         FROM budgets b JOIN categories c ON c.id = b.category_id
         WHERE b.user_id = ?1 AND b.year = ?2 AND b.month = ?3
         ORDER BY c.name ASC",
    )?;
    let category_rows = stmt
        .query_map(rusqlite::params![user_id, year, month_num], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT s.name, b.planned_amount, b.spent_amount, b.remaining_amount
         FROM cash_flow_source_budgets b
         JOIN cash_flow_sources s ON s.id = b.cash_flow_source_id
         WHERE b.user_id = ?1 AND b.year = ?2 AND b.month = ?3
         ORDER BY s.name ASC",
    )?;
    let source_rows = stmt
        .query_map(rusqlite::params![user_id, year, month_num], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if category_rows.is_empty() && source_rows.is_empty() {
        println!("No budgets for {month}.");
        return Ok(());
    }

    if !category_rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Category", "Planned", "Spent", "Remaining"]);
        for (name, planned, spent, remaining) in category_rows {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(money(planned)),
                Cell::new(money(spent)),
                Cell::new(money(remaining)),
            ]);
        }
        println!("Category budgets for {month}\n{table}");
    }

    if !source_rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Source", "Planned", "Spent", "Remaining"]);
        for (name, planned, spent, remaining) in source_rows {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(money(planned)),
                Cell::new(money(spent)),
                Cell::new(money(remaining)),
            ]);
        }
        println!("Source budgets for {month}\n{table}");
    }

    Ok(())
}
