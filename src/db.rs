use std::collections::HashMap;
use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::{CashFlowSource, Category, CategoryType, TxnType};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    category_type TEXT NOT NULL,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS cash_flow_sources (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    source_type TEXT NOT NULL,
    allows_refunds INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    transaction_date TEXT NOT NULL,
    posting_date TEXT,
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    transaction_type TEXT NOT NULL,
    category_id INTEGER,
    cash_flow_source_id INTEGER,
    reference_number TEXT,
    notes TEXT,
    status TEXT DEFAULT 'completed',
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (category_id) REFERENCES categories(id),
    FOREIGN KEY (cash_flow_source_id) REFERENCES cash_flow_sources(id)
);

CREATE TABLE IF NOT EXISTS budgets (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    planned_amount REAL DEFAULT 0,
    spent_amount REAL DEFAULT 0,
    remaining_amount REAL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (category_id) REFERENCES categories(id),
    UNIQUE (user_id, category_id, year, month)
);

CREATE TABLE IF NOT EXISTS cash_flow_source_budgets (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    cash_flow_source_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    planned_amount REAL DEFAULT 0,
    spent_amount REAL DEFAULT 0,
    remaining_amount REAL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (cash_flow_source_id) REFERENCES cash_flow_sources(id),
    UNIQUE (user_id, cash_flow_source_id, year, month)
);

CREATE INDEX IF NOT EXISTS idx_transactions_user_date
    ON transactions(user_id, transaction_date);
CREATE INDEX IF NOT EXISTS idx_transactions_category
    ON transactions(category_id);
CREATE INDEX IF NOT EXISTS idx_transactions_source
    ON transactions(cash_flow_source_id);
";

// (name, category_type)
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Salary", "income"),
    ("Other Income", "income"),
    ("Groceries", "expense"),
    ("Housing", "expense"),
    ("Utilities", "expense"),
    ("Transport", "expense"),
    ("Health", "expense"),
    ("Leisure", "expense"),
    ("Fees & Charges", "expense"),
    ("Transfers", "both"),
    ("Uncategorized", "both"),
];

// (name, source_type, allows_refunds)
const DEFAULT_SOURCES: &[(&str, &str, bool)] = &[
    ("Salary", "income", false),
    ("Checking Account", "expense", true),
    ("Credit Card", "expense", true),
    ("Cash", "expense", false),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let users: i64 = conn.query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
    if users == 0 {
        conn.execute("INSERT INTO users (name) VALUES (?1)", ["default"])?;
    }
    let user_id: i64 = conn.query_row("SELECT min(id) FROM users", [], |row| row.get(0))?;

    let categories: i64 =
        conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if categories == 0 {
        for cat in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (user_id, name, category_type) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, cat.0, cat.1],
            )?;
        }
    }

    let sources: i64 =
        conn.query_row("SELECT count(*) FROM cash_flow_sources", [], |row| row.get(0))?;
    if sources == 0 {
        for src in DEFAULT_SOURCES {
            conn.execute(
                "INSERT INTO cash_flow_sources (user_id, name, source_type, allows_refunds) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id, src.0, src.1, src.2],
            )?;
        }
    }

    Ok(())
}

pub fn default_user_id(conn: &Connection) -> Result<i64> {
    let id = conn.query_row("SELECT min(id) FROM users", [], |row| row.get(0))?;
    Ok(id)
}

/// Active categories for a user, keyed by id. Assignment validation and
/// suggestion filtering only ever consult this map.
pub fn category_directory(conn: &Connection, user_id: i64) -> Result<HashMap<i64, Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, category_type, is_active
         FROM categories WHERE user_id = ?1 AND is_active = 1",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        let type_str: String = row.get(3)?;
        Ok(Category {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            category_type: CategoryType::parse(&type_str).unwrap_or(CategoryType::Both),
            is_active: row.get(4)?,
        })
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let category = row?;
        map.insert(category.id, category);
    }
    Ok(map)
}

pub fn source_directory(conn: &Connection, user_id: i64) -> Result<HashMap<i64, CashFlowSource>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, source_type, allows_refunds, is_active
         FROM cash_flow_sources WHERE user_id = ?1 AND is_active = 1",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        let type_str: String = row.get(3)?;
        Ok(CashFlowSource {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            source_type: TxnType::parse(&type_str).unwrap_or(TxnType::Expense),
            allows_refunds: row.get(4)?,
            is_active: row.get(5)?,
        })
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let source = row?;
        map.insert(source.id, source);
    }
    Ok(map)
}
