use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{round2, CategoryType, TxnType};

/// Recalculates spent/remaining for one category budget cell. A missing
/// budget row means the user never planned that month; nothing to do.
///
/// Category spending is bucketed by the posting date when the statement
/// provided one, falling back to the transaction date.
pub fn recompute_category_budget(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    year: i32,
    month: u32,
) -> Result<()> {
    let budget: Option<(i64, f64)> = conn
        .query_row(
            "SELECT id, planned_amount FROM budgets
             WHERE user_id = ?1 AND category_id = ?2 AND year = ?3 AND month = ?4",
            params![user_id, category_id, year, month],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((budget_id, planned)) = budget else {
        return Ok(());
    };

    let category_type: Option<String> = conn
        .query_row(
            "SELECT category_type FROM categories WHERE id = ?1 AND user_id = ?2",
            params![category_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    let category_type = category_type
        .as_deref()
        .and_then(CategoryType::parse)
        .unwrap_or(CategoryType::Expense);

    let period = format!("{year:04}-{month:02}");
    let sum_for = |txn_type: TxnType| -> Result<f64> {
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions
             WHERE user_id = ?1 AND category_id = ?2 AND status = 'completed'
               AND transaction_type = ?3
               AND strftime('%Y-%m', COALESCE(posting_date, transaction_date)) = ?4",
            params![user_id, category_id, txn_type.as_str(), period],
            |row| row.get(0),
        )?;
        Ok(total)
    };

    let spent = match category_type {
        CategoryType::Expense => sum_for(TxnType::Expense)?,
        CategoryType::Income => sum_for(TxnType::Income)?,
        // A mixed category tracks its net outflow.
        CategoryType::Both => sum_for(TxnType::Expense)? - sum_for(TxnType::Income)?,
    };
    let spent = round2(spent);

    conn.execute(
        "UPDATE budgets SET spent_amount = ?1, remaining_amount = ?2 WHERE id = ?3",
        params![spent, round2(planned - spent), budget_id],
    )?;
    Ok(())
}

/// Recalculates spent/remaining for one cash-flow-source budget cell.
/// Source spending is always bucketed by the transaction date. Sources
/// that allow refunds net the opposite-direction rows against the
/// matching ones; others count only the matching direction.
pub fn recompute_source_budget(
    conn: &Connection,
    user_id: i64,
    source_id: i64,
    year: i32,
    month: u32,
) -> Result<()> {
    let budget: Option<(i64, f64)> = conn
        .query_row(
            "SELECT id, planned_amount FROM cash_flow_source_budgets
             WHERE user_id = ?1 AND cash_flow_source_id = ?2 AND year = ?3 AND month = ?4",
            params![user_id, source_id, year, month],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((budget_id, planned)) = budget else {
        return Ok(());
    };

    let source: Option<(String, bool)> = conn
        .query_row(
            "SELECT source_type, allows_refunds FROM cash_flow_sources
             WHERE id = ?1 AND user_id = ?2",
            params![source_id, user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((type_str, allows_refunds)) = source else {
        return Ok(());
    };
    let source_type = TxnType::parse(&type_str).unwrap_or(TxnType::Expense);

    let period = format!("{year:04}-{month:02}");
    let sum_for = |txn_type: TxnType| -> Result<f64> {
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions
             WHERE user_id = ?1 AND cash_flow_source_id = ?2 AND status = 'completed'
               AND transaction_type = ?3
               AND strftime('%Y-%m', transaction_date) = ?4",
            params![user_id, source_id, txn_type.as_str(), period],
            |row| row.get(0),
        )?;
        Ok(total)
    };

    let spent = if allows_refunds {
        sum_for(source_type)? - sum_for(source_type.opposite())?
    } else {
        sum_for(source_type)?
    };
    let spent = round2(spent);

    conn.execute(
        "UPDATE cash_flow_source_budgets SET spent_amount = ?1, remaining_amount = ?2 WHERE id = ?3",
        params![spent, round2(planned - spent), budget_id],
    )?;
    Ok(())
}

pub fn set_category_budget(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    year: i32,
    month: u32,
    planned: f64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO budgets (user_id, category_id, year, month, planned_amount, remaining_amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT (user_id, category_id, year, month)
         DO UPDATE SET planned_amount = excluded.planned_amount",
        params![user_id, category_id, year, month, planned],
    )?;
    recompute_category_budget(conn, user_id, category_id, year, month)
}

pub fn set_source_budget(
    conn: &Connection,
    user_id: i64,
    source_id: i64,
    year: i32,
    month: u32,
    planned: f64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO cash_flow_source_budgets
            (user_id, cash_flow_source_id, year, month, planned_amount, remaining_amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT (user_id, cash_flow_source_id, year, month)
         DO UPDATE SET planned_amount = excluded.planned_amount",
        params![user_id, source_id, year, month, planned],
    )?;
    recompute_source_budget(conn, user_id, source_id, year, month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{default_user_id, get_connection, init_db};
    use rusqlite::Connection;

    fn test_db() -> (tempfile::TempDir, Connection, i64) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let user_id = default_user_id(&conn).unwrap();
        (dir, conn, user_id)
    }

    fn category_id(conn: &Connection, name: &str) -> i64 {
        conn.query_row("SELECT id FROM categories WHERE name = ?1", [name], |r| r.get(0))
            .unwrap()
    }

    fn source_id(conn: &Connection, name: &str) -> i64 {
        conn.query_row("SELECT id FROM cash_flow_sources WHERE name = ?1", [name], |r| {
            r.get(0)
        })
        .unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_txn(
        conn: &Connection,
        user_id: i64,
        date: &str,
        posting_date: Option<&str>,
        amount: f64,
        txn_type: &str,
        category: i64,
        source: i64,
    ) {
        conn.execute(
            "INSERT INTO transactions
                (user_id, transaction_date, posting_date, description, amount,
                 transaction_type, category_id, cash_flow_source_id)
             VALUES (?1, ?2, ?3, 'test', ?4, ?5, ?6, ?7)",
            params![user_id, date, posting_date, amount, txn_type, category, source],
        )
        .unwrap();
    }

    #[test]
    fn test_expense_budget_spent_and_remaining() {
        let (_dir, conn, user_id) = test_db();
        let groceries = category_id(&conn, "Groceries");
        let card = source_id(&conn, "Credit Card");

        set_category_budget(&conn, user_id, groceries, 2024, 2, 1000.0).unwrap();
        insert_txn(&conn, user_id, "2024-02-01", None, 250.5, "expense", groceries, card);
        insert_txn(&conn, user_id, "2024-02-10", None, 100.0, "expense", groceries, card);
        // A different month stays out of the bucket.
        insert_txn(&conn, user_id, "2024-03-01", None, 999.0, "expense", groceries, card);

        recompute_category_budget(&conn, user_id, groceries, 2024, 2).unwrap();
        let (spent, remaining): (f64, f64) = conn
            .query_row(
                "SELECT spent_amount, remaining_amount FROM budgets
                 WHERE category_id = ?1 AND year = 2024 AND month = 2",
                [groceries],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(spent, 350.5);
        assert_eq!(remaining, 649.5);
    }

    #[test]
    fn test_category_budget_uses_posting_date_when_present() {
        let (_dir, conn, user_id) = test_db();
        let groceries = category_id(&conn, "Groceries");
        let card = source_id(&conn, "Credit Card");

        set_category_budget(&conn, user_id, groceries, 2024, 3, 500.0).unwrap();
        // Bought in February, posted in March: counts against March.
        insert_txn(
            &conn,
            user_id,
            "2024-02-28",
            Some("2024-03-02"),
            120.0,
            "expense",
            groceries,
            card,
        );

        recompute_category_budget(&conn, user_id, groceries, 2024, 3).unwrap();
        let spent: f64 = conn
            .query_row(
                "SELECT spent_amount FROM budgets WHERE category_id = ?1 AND month = 3",
                [groceries],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(spent, 120.0);
    }

    #[test]
    fn test_both_category_tracks_net_outflow() {
        let (_dir, conn, user_id) = test_db();
        let transfers = category_id(&conn, "Transfers");
        let checking = source_id(&conn, "Checking Account");

        set_category_budget(&conn, user_id, transfers, 2024, 2, 0.0).unwrap();
        insert_txn(&conn, user_id, "2024-02-05", None, 300.0, "expense", transfers, checking);
        insert_txn(&conn, user_id, "2024-02-06", None, 200.0, "income", transfers, checking);

        recompute_category_budget(&conn, user_id, transfers, 2024, 2).unwrap();
        let spent: f64 = conn
            .query_row(
                "SELECT spent_amount FROM budgets WHERE category_id = ?1",
                [transfers],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(spent, 100.0);
    }

    #[test]
    fn test_source_budget_nets_refunds_when_allowed() {
        let (_dir, conn, user_id) = test_db();
        let groceries = category_id(&conn, "Groceries");
        let card = source_id(&conn, "Credit Card");
        let cash = source_id(&conn, "Cash");

        set_source_budget(&conn, user_id, card, 2024, 2, 1000.0).unwrap();
        set_source_budget(&conn, user_id, cash, 2024, 2, 1000.0).unwrap();
        // Card allows refunds: 400 spent, 50 refunded.
        insert_txn(&conn, user_id, "2024-02-03", None, 400.0, "expense", groceries, card);
        insert_txn(&conn, user_id, "2024-02-04", None, 50.0, "income", groceries, card);
        // Cash does not: the stray income row is ignored.
        insert_txn(&conn, user_id, "2024-02-03", None, 400.0, "expense", groceries, cash);
        insert_txn(&conn, user_id, "2024-02-04", None, 50.0, "income", groceries, cash);

        recompute_source_budget(&conn, user_id, card, 2024, 2).unwrap();
        recompute_source_budget(&conn, user_id, cash, 2024, 2).unwrap();

        let card_spent: f64 = conn
            .query_row(
                "SELECT spent_amount FROM cash_flow_source_budgets WHERE cash_flow_source_id = ?1",
                [card],
                |r| r.get(0),
            )
            .unwrap();
        let cash_spent: f64 = conn
            .query_row(
                "SELECT spent_amount FROM cash_flow_source_budgets WHERE cash_flow_source_id = ?1",
                [cash],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(card_spent, 350.0);
        assert_eq!(cash_spent, 400.0);
    }

    #[test]
    fn test_source_budget_buckets_by_transaction_date() {
        let (_dir, conn, user_id) = test_db();
        let groceries = category_id(&conn, "Groceries");
        let card = source_id(&conn, "Credit Card");

        set_source_budget(&conn, user_id, card, 2024, 2, 500.0).unwrap();
        // Posting date in March does not move it out of February.
        insert_txn(
            &conn,
            user_id,
            "2024-02-28",
            Some("2024-03-02"),
            120.0,
            "expense",
            groceries,
            card,
        );

        recompute_source_budget(&conn, user_id, card, 2024, 2).unwrap();
        let spent: f64 = conn
            .query_row(
                "SELECT spent_amount FROM cash_flow_source_budgets WHERE cash_flow_source_id = ?1",
                [card],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(spent, 120.0);
    }

    #[test]
    fn test_recompute_without_budget_row_is_a_noop() {
        let (_dir, conn, user_id) = test_db();
        let groceries = category_id(&conn, "Groceries");
        recompute_category_budget(&conn, user_id, groceries, 2024, 2).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM budgets", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
