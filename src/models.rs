use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reader::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnType {
    Income,
    Expense,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Income => Self::Expense,
            Self::Expense => Self::Income,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Income,
    Expense,
    Both,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// A `both` category accepts income and expense rows alike.
    pub fn accepts(&self, txn_type: TxnType) -> bool {
        match self {
            Self::Both => true,
            Self::Income => txn_type == TxnType::Income,
            Self::Expense => txn_type == TxnType::Expense,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub category_type: CategoryType,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct CashFlowSource {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub source_type: TxnType,
    pub allows_refunds: bool,
    pub is_active: bool,
}

/// One validated, categorized row ready for persistence.
#[derive(Debug, Clone, Serialize)]
pub struct TransformedRow {
    pub row_index: usize,
    pub original_row_number: usize,
    pub transaction_date: NaiveDate,
    pub posting_date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub txn_type: TxnType,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub cash_flow_source_id: Option<i64>,
    pub cash_flow_source_name: Option<String>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub raw_values: Vec<Cell>,
}

/// A rejected row. Rejection is per-row; it never aborts the batch
/// during a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub row_index: usize,
    pub field: &'static str,
    pub message: String,
    pub values: Vec<Cell>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub count: usize,
    pub income_total: f64,
    pub expense_total: f64,
    pub date_range: DateRange,
    /// Distinct YYYY-MM months touched, in encounter order.
    pub months: Vec<String>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_type_accepts() {
        assert!(CategoryType::Both.accepts(TxnType::Income));
        assert!(CategoryType::Both.accepts(TxnType::Expense));
        assert!(CategoryType::Income.accepts(TxnType::Income));
        assert!(!CategoryType::Income.accepts(TxnType::Expense));
        assert!(!CategoryType::Expense.accepts(TxnType::Income));
    }

    #[test]
    fn test_txn_type_roundtrip() {
        assert_eq!(TxnType::parse("income"), Some(TxnType::Income));
        assert_eq!(TxnType::parse("expense"), Some(TxnType::Expense));
        assert_eq!(TxnType::parse("transfer"), None);
        assert_eq!(TxnType::Income.as_str(), "income");
        assert_eq!(TxnType::Income.opposite(), TxnType::Expense);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(350.454), 350.45);
        assert_eq!(round2(350.456), 350.46);
        assert_eq!(round2(10000.0), 10000.0);
    }
}
