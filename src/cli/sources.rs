use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::db::{default_user_id, get_connection};
use crate::error::{FlowbookError, Result};
use crate::models::TxnType;
use crate::settings::get_data_dir;

pub fn add(name: &str, source_type: &str, allows_refunds: bool) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("flowbook.db"))?;
    let user_id = default_user_id(&conn)?;
    add_source(&conn, user_id, name, source_type, allows_refunds)?;
    println!("Added cash-flow source: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("flowbook.db"))?;
    let user_id = default_user_id(&conn)?;

    let mut stmt = conn.prepare(
        "SELECT id, name, source_type, allows_refunds FROM cash_flow_sources
         WHERE user_id = ?1 AND is_active = 1
         ORDER BY CASE source_type WHEN 'income' THEN 0 ELSE 1 END, name ASC",
    )?;
    let sources = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Refunds"]);
    for (id, name, source_type, allows_refunds) in sources {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(name),
            Cell::new(source_type),
            Cell::new(if allows_refunds { "yes" } else { "no" }),
        ]);
    }
    println!("Cash-flow sources\n{table}");
    Ok(())
}

pub fn add_source(
    conn: &Connection,
    user_id: i64,
    name: &str,
    source_type: &str,
    allows_refunds: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FlowbookError::Other("Name is required".into()));
    }
    if TxnType::parse(source_type).is_none() {
        return Err(FlowbookError::Other(format!(
            "Invalid source type: {source_type} (must be 'income' or 'expense')"
        )));
    }
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cash_flow_sources WHERE user_id = ?1 AND name = ?2 AND is_active = 1)",
        rusqlite::params![user_id, name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(FlowbookError::Other(format!(
            "Source name already exists: {name}"
        )));
    }
    conn.execute(
        "INSERT INTO cash_flow_sources (user_id, name, source_type, allows_refunds) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user_id, name, source_type, allows_refunds],
    )?;
    Ok(())
}

pub fn find_source_id(conn: &Connection, user_id: i64, name: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM cash_flow_sources WHERE user_id = ?1 AND name = ?2 AND is_active = 1",
        rusqlite::params![user_id, name],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FlowbookError::UnknownSource(name.to_string()),
        other => FlowbookError::Db(other),
    })
}
