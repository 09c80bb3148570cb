use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::db::{default_user_id, get_connection};
use crate::error::{FlowbookError, Result};
use crate::models::CategoryType;
use crate::settings::get_data_dir;

pub fn add(name: &str, category_type: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("flowbook.db"))?;
    let user_id = default_user_id(&conn)?;
    add_category(&conn, user_id, name, category_type)?;
    println!("Added category: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("flowbook.db"))?;
    let user_id = default_user_id(&conn)?;

    let mut stmt = conn.prepare(
        "SELECT id, name, category_type FROM categories
         WHERE user_id = ?1 AND is_active = 1
         ORDER BY CASE category_type WHEN 'income' THEN 0 WHEN 'expense' THEN 1 ELSE 2 END, name ASC",
    )?;
    let categories = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type"]);
    for (id, name, category_type) in categories {
        table.add_row(vec![Cell::new(id), Cell::new(name), Cell::new(category_type)]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn add_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    category_type: &str,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FlowbookError::Other("Name is required".into()));
    }
    if CategoryType::parse(category_type).is_none() {
        return Err(FlowbookError::Other(format!(
            "Invalid category type: {category_type} (must be 'income', 'expense' or 'both')"
        )));
    }
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE user_id = ?1 AND name = ?2 AND is_active = 1)",
        rusqlite::params![user_id, name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(FlowbookError::Other(format!(
            "Category name already exists: {name}"
        )));
    }
    conn.execute(
        "INSERT INTO categories (user_id, name, category_type) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, name, category_type],
    )?;
    Ok(())
}

pub fn find_category_id(conn: &Connection, user_id: i64, name: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM categories WHERE user_id = ?1 AND name = ?2 AND is_active = 1",
        rusqlite::params![user_id, name],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FlowbookError::UnknownCategory(name.to_string()),
        other => FlowbookError::Db(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn test_conn() -> (tempfile::TempDir, Connection, i64) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let user_id = default_user_id(&conn).unwrap();
        (dir, conn, user_id)
    }

    #[test]
    fn test_add_category_and_find() {
        let (_dir, conn, user_id) = test_conn();
        add_category(&conn, user_id, "Pets", "expense").unwrap();
        let id = find_category_id(&conn, user_id, "Pets").unwrap();
        assert!(id > 0);
    }

    #[test]
    fn test_add_duplicate_name_rejected() {
        let (_dir, conn, user_id) = test_conn();
        add_category(&conn, user_id, "Pets", "expense").unwrap();
        let err = add_category(&conn, user_id, "Pets", "income").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_add_invalid_type_rejected() {
        let (_dir, conn, user_id) = test_conn();
        let err = add_category(&conn, user_id, "Bad", "revenue").unwrap_err();
        assert!(err.to_string().contains("Invalid category type"));
    }

    #[test]
    fn test_both_is_a_valid_type() {
        let (_dir, conn, user_id) = test_conn();
        add_category(&conn, user_id, "Shared Wallet", "both").unwrap();
    }

    #[test]
    fn test_find_unknown_category() {
        let (_dir, conn, user_id) = test_conn();
        let err = find_category_id(&conn, user_id, "Nope").unwrap_err();
        assert!(err.to_string().contains("Unknown category"));
    }
}
