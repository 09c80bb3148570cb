use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dates::{detect_date, excel_serial_to_date};
use crate::models::TxnType;
use crate::reader::{looks_like_excel_date, Cell};

/// An amount below this threshold is treated as zero.
const ZERO_EPSILON: f64 = 0.0001;

// ---------------------------------------------------------------------------
// Column mapping — validated once at the boundary into typed variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub column: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DateMapping {
    Column {
        column: Option<usize>,
        #[serde(default)]
        format: Option<String>,
    },
    Fixed {
        value: Option<String>,
        #[serde(default)]
        format: Option<String>,
    },
    SameAsTransaction,
}

impl Default for DateMapping {
    fn default() -> Self {
        Self::SameAsTransaction
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AmountMapping {
    Single {
        column: Option<usize>,
        #[serde(default)]
        negate: bool,
    },
    Split {
        #[serde(default)]
        debit_column: Option<usize>,
        #[serde(default)]
        credit_column: Option<usize>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TypeMapping {
    AutoFromAmount,
    Fixed {
        fixed_value: Option<String>,
    },
    Column {
        column: Option<usize>,
        #[serde(default)]
        income_values: Vec<String>,
        #[serde(default)]
        expense_values: Vec<String>,
    },
}

impl Default for TypeMapping {
    fn default() -> Self {
        Self::AutoFromAmount
    }
}

/// The caller-declared column-to-field mapping for one import batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: DateMapping,
    pub description: ColumnRef,
    pub amount: AmountMapping,
    #[serde(rename = "type", default)]
    pub txn_type: TypeMapping,
    #[serde(default)]
    pub posting_date: DateMapping,
    #[serde(default)]
    pub reference: Option<ColumnRef>,
    #[serde(default)]
    pub notes: Option<ColumnRef>,
}

// ---------------------------------------------------------------------------
// Date resolution
// ---------------------------------------------------------------------------

/// Resolve a date for a row. Errors are user-facing row messages, not
/// exceptions; the processor decides whether a failure is recorded or
/// silently skipped.
pub fn resolve_date(
    values: &[Cell],
    mapping: &DateMapping,
    fallback: Option<NaiveDate>,
) -> Result<NaiveDate, String> {
    match mapping {
        DateMapping::SameAsTransaction => {
            fallback.ok_or_else(|| "No transaction date available to reuse.".to_string())
        }
        DateMapping::Fixed { value, format } => {
            let raw = value.as_deref().map(str::trim).unwrap_or("");
            if raw.is_empty() {
                return Err("No fixed date configured.".to_string());
            }
            parse_date_value(&Cell::Text(raw.to_string()), format.as_deref())
        }
        DateMapping::Column { column, format } => {
            let Some(column) = column else {
                return Err("No date column selected.".to_string());
            };
            let value = values.get(*column).unwrap_or(&Cell::Null);
            parse_date_value(value, format.as_deref())
        }
    }
}

fn parse_date_value(value: &Cell, format: Option<&str>) -> Result<NaiveDate, String> {
    if value.is_empty() {
        return Err("Missing date value in this row.".to_string());
    }

    if let Some(format) = format {
        if let Ok(date) = NaiveDate::parse_from_str(value.display().trim(), format) {
            return Ok(date);
        }
        // Fall through to auto detection.
    }

    match value {
        Cell::Number(n) => {
            if looks_like_excel_date(*n) {
                if let Some(date) = excel_serial_to_date(*n) {
                    return Ok(date);
                }
            }
            Err(format!("Could not parse date value: {}", value.display()))
        }
        Cell::Text(s) => detect_date(s)
            .ok_or_else(|| format!("Could not parse date value: {}", s.trim())),
        // Null is rejected by the emptiness check above.
        Cell::Null => Err("Missing date value in this row.".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Amount resolution
// ---------------------------------------------------------------------------

/// Resolve the amount and its sign-derived direction. The returned
/// amount is always positive.
pub fn resolve_amount(
    values: &[Cell],
    mapping: &AmountMapping,
) -> Result<(f64, TxnType), String> {
    match mapping {
        AmountMapping::Single { column, negate } => {
            let Some(column) = column else {
                return Err("No amount column selected.".to_string());
            };
            let value = values.get(*column).unwrap_or(&Cell::Null);
            let Some(mut number) = parse_number_cell(value) else {
                return Err("Could not parse the amount in this row.".to_string());
            };
            if *negate {
                number = -number;
            }
            if number.abs() < ZERO_EPSILON {
                return Err("The amount in this row is zero.".to_string());
            }
            let direction = if number >= 0.0 {
                TxnType::Income
            } else {
                TxnType::Expense
            };
            Ok((number.abs(), direction))
        }
        AmountMapping::Split {
            debit_column,
            credit_column,
        } => resolve_split_amount(values, *debit_column, *credit_column),
    }
}

fn resolve_split_amount(
    values: &[Cell],
    debit_column: Option<usize>,
    credit_column: Option<usize>,
) -> Result<(f64, TxnType), String> {
    if debit_column.is_none() && credit_column.is_none() {
        return Err("Select at least one of the debit or credit columns.".to_string());
    }

    let read = |column: Option<usize>| {
        column.and_then(|c| parse_number_cell(values.get(c).unwrap_or(&Cell::Null)))
    };
    let debit = read(debit_column);
    let credit = read(credit_column);

    let non_trivial = |v: Option<f64>| v.map(|n| n.abs() >= ZERO_EPSILON).unwrap_or(false);

    if !non_trivial(debit) && !non_trivial(credit) {
        return Err("No debit or credit values found in this row.".to_string());
    }

    if non_trivial(debit) && non_trivial(credit) {
        let net = credit.unwrap_or(0.0) - debit.unwrap_or(0.0);
        if net.abs() < ZERO_EPSILON {
            return Err("The debit and credit amounts balance to zero.".to_string());
        }
        let direction = if net >= 0.0 {
            TxnType::Income
        } else {
            TxnType::Expense
        };
        return Ok((net.abs(), direction));
    }

    if non_trivial(credit) {
        return Ok((credit.unwrap_or(0.0).abs(), TxnType::Income));
    }
    if non_trivial(debit) {
        return Ok((debit.unwrap_or(0.0).abs(), TxnType::Expense));
    }

    Err("Could not parse the debit/credit amounts.".to_string())
}

// ---------------------------------------------------------------------------
// Type resolution
// ---------------------------------------------------------------------------

pub fn resolve_type(
    values: &[Cell],
    mapping: &TypeMapping,
    direction: Option<TxnType>,
) -> Result<TxnType, String> {
    match mapping {
        TypeMapping::Fixed { fixed_value } => fixed_value
            .as_deref()
            .and_then(TxnType::parse)
            .ok_or_else(|| "Choose whether this is income or an expense.".to_string()),
        TypeMapping::Column {
            column,
            income_values,
            expense_values,
        } => {
            let Some(column) = column else {
                return Err("No column selected for the cash-flow type.".to_string());
            };
            let value = values.get(*column).unwrap_or(&Cell::Null);
            if value.is_empty() {
                return Err("Missing value in the cash-flow type column.".to_string());
            }
            let normalized = value.display().trim().to_lowercase();
            let normalize_list = |items: &[String]| -> Vec<String> {
                items
                    .iter()
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            };
            if normalize_list(income_values).contains(&normalized) {
                return Ok(TxnType::Income);
            }
            if normalize_list(expense_values).contains(&normalized) {
                return Ok(TxnType::Expense);
            }
            Err("Unrecognized value in the cash-flow type column.".to_string())
        }
        TypeMapping::AutoFromAmount => direction
            .ok_or_else(|| "Could not derive the cash-flow type from the amount.".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Number normalization
// ---------------------------------------------------------------------------

fn comma_thousands_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d{1,3}(,\d{3})+(\.\d+)?$").unwrap())
}

fn dot_thousands_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+(,\d+)?$").unwrap())
}

fn comma_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+,\d+$").unwrap())
}

/// Parse a raw amount string tolerant of currency symbols, NBSP
/// padding, and both thousands-separator conventions.
pub fn parse_number_str(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut normalized: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '\u{00A0}' | ' ' | '₪' | '$' | '€' | '£'))
        .collect();

    if comma_thousands_re().is_match(&normalized) {
        normalized = normalized.replace(',', "");
    } else if dot_thousands_re().is_match(&normalized) {
        normalized = normalized.replace('.', "").replace(',', ".");
    } else if comma_decimal_re().is_match(&normalized) {
        normalized = normalized.replace(',', ".");
    }

    normalized.parse::<f64>().ok()
}

pub fn parse_number_cell(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Null => None,
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => parse_number_str(s),
    }
}
