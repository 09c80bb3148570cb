use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::detect_date_cell;
use crate::models::DateRange;
use crate::parser::parse_number_cell;
use crate::reader::{Cell, GridRow};

const SAMPLE_LIMIT: usize = 5;
const HEADER_CANDIDATE_LIMIT: usize = 5;

/// Rows that look like a header are never auto-skipped, even when they
/// trip a summary keyword.
const HEADER_SCORE_SKIP_THRESHOLD: f64 = 0.3;

/// Keywords marking summary/footer rows in bank exports, Hebrew and
/// English alike.
const SUMMARY_KEYWORDS: &[&str] = &[
    "סה\"כ", "סיכום", "יתרה", "עמלה", "הודעה", "פירוט", "פרטי חשבון",
    "דף חשבון", "יתרת פתיחה", "יתרת סגירה", "סך הכל",
    "total", "balance", "summary",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Date,
    Number,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyRow,
    SummaryRow,
    ShortSingleValue,
    MetadataRow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub index: usize,
    /// Spreadsheet-style letter label (A, B, ... Z, AA).
    pub label: String,
    pub sample_values: Vec<Cell>,
    /// Types seen in this column, in first-seen order. A set, not an
    /// exclusive classification.
    pub detected_types: Vec<ValueKind>,
    pub header_guess: Option<String>,
    #[serde(skip)]
    date_candidates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowInsight {
    pub index: usize,
    pub original_index: usize,
    pub values: Vec<Cell>,
    pub non_empty_count: usize,
    pub skip_reasons: Vec<SkipReason>,
    /// Fraction of non-empty cells that are short, digit-free text with
    /// letters.
    pub header_like_score: f64,
    pub auto_skip: bool,
}

impl RowInsight {
    pub fn has_structural_skip_reason(&self) -> bool {
        !self.skip_reasons.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub columns: Vec<ColumnProfile>,
    pub rows: Vec<RowInsight>,
    /// Row indices most likely to be the header row, best first.
    pub header_candidates: Vec<usize>,
    pub detected_date_range: DateRange,
    pub numeric_columns: Vec<usize>,
}

pub fn analyze(rows: &[GridRow], total_columns: usize) -> Analysis {
    let mut columns = analyze_columns(rows, total_columns);
    let row_insights = analyze_rows(rows);
    let header_candidates = identify_header_candidates(&row_insights);
    attach_header_guesses(&mut columns, rows, &header_candidates);

    let detected_date_range = calculate_date_range(&columns);
    let numeric_columns = columns
        .iter()
        .filter(|c| c.detected_types.contains(&ValueKind::Number))
        .map(|c| c.index)
        .collect();

    Analysis {
        columns,
        rows: row_insights,
        header_candidates,
        detected_date_range,
        numeric_columns,
    }
}

fn analyze_columns(rows: &[GridRow], total_columns: usize) -> Vec<ColumnProfile> {
    let mut columns = Vec::with_capacity(total_columns);

    for col_index in 0..total_columns {
        let mut samples = Vec::new();
        let mut detected_types = Vec::new();
        let mut date_candidates = Vec::new();

        for row in rows {
            let Some(value) = row.values.get(col_index) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            if samples.len() < SAMPLE_LIMIT {
                samples.push(value.clone());
            }

            let kind = if let Some(date) = detect_date_cell(value) {
                date_candidates.push(date);
                ValueKind::Date
            } else if parse_number_cell(value).is_some() {
                ValueKind::Number
            } else {
                ValueKind::Text
            };
            if !detected_types.contains(&kind) {
                detected_types.push(kind);
            }
        }

        columns.push(ColumnProfile {
            index: col_index,
            label: column_label(col_index),
            sample_values: samples,
            detected_types,
            header_guess: None,
            date_candidates,
        });
    }

    columns
}

fn analyze_rows(rows: &[GridRow]) -> Vec<RowInsight> {
    rows.iter()
        .map(|row| {
            let non_empty_count = row.values.iter().filter(|v| !v.is_empty()).count();
            let skip_reasons = detect_skip_reasons(&row.values);
            let header_like_score = header_score(&row.values, non_empty_count);
            let auto_skip =
                !skip_reasons.is_empty() && header_like_score < HEADER_SCORE_SKIP_THRESHOLD;

            RowInsight {
                index: row.index,
                original_index: row.original_index,
                values: row.values.clone(),
                non_empty_count,
                skip_reasons,
                header_like_score,
                auto_skip,
            }
        })
        .collect()
}

fn identify_header_candidates(rows: &[RowInsight]) -> Vec<usize> {
    let mut candidates: Vec<&RowInsight> =
        rows.iter().filter(|r| r.non_empty_count >= 2).collect();
    // Stable sort keeps encounter order for equal scores.
    candidates.sort_by(|a, b| {
        b.header_like_score
            .partial_cmp(&a.header_like_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
        .iter()
        .take(HEADER_CANDIDATE_LIMIT)
        .map(|r| r.index)
        .collect()
}

/// First candidate to supply a short text cell for a column wins; later
/// candidates never overwrite a guess.
fn attach_header_guesses(
    columns: &mut [ColumnProfile],
    rows: &[GridRow],
    header_candidates: &[usize],
) {
    for &row_index in header_candidates {
        let Some(row) = rows.get(row_index) else {
            continue;
        };
        for (col_index, value) in row.values.iter().enumerate() {
            let Some(column) = columns.get_mut(col_index) else {
                continue;
            };
            if column.header_guess.is_some() {
                continue;
            }
            if let Cell::Text(text) = value {
                if text.chars().count() <= 80 {
                    column.header_guess = Some(text.clone());
                }
            }
        }
    }
}

fn calculate_date_range(columns: &[ColumnProfile]) -> DateRange {
    let mut dates: Vec<NaiveDate> = columns
        .iter()
        .flat_map(|c| c.date_candidates.iter().copied())
        .collect();
    dates.sort();

    DateRange {
        min: dates.first().copied(),
        max: dates.last().copied(),
    }
}

fn detect_skip_reasons(values: &[Cell]) -> Vec<SkipReason> {
    let non_empty: Vec<&Cell> = values.iter().filter(|v| !v.is_empty()).collect();

    if non_empty.is_empty() {
        return vec![SkipReason::EmptyRow];
    }

    let concatenated = non_empty
        .iter()
        .map(|v| v.display())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    for keyword in SUMMARY_KEYWORDS {
        if concatenated.contains(&keyword.to_lowercase()) {
            return vec![SkipReason::SummaryRow];
        }
    }

    if non_empty.len() == 1 && non_empty[0].display().chars().count() <= 4 {
        return vec![SkipReason::ShortSingleValue];
    }

    let all_digit_free_text = non_empty.iter().all(|v| match v {
        Cell::Text(s) => !s.chars().any(|c| c.is_numeric()),
        _ => false,
    });
    if all_digit_free_text {
        return vec![SkipReason::MetadataRow];
    }

    Vec::new()
}

fn header_score(values: &[Cell], non_empty_count: usize) -> f64 {
    if non_empty_count == 0 {
        return 0.0;
    }

    let textual = values
        .iter()
        .filter(|v| !v.is_empty())
        .filter(|v| {
            let text = v.display();
            let text = text.trim();
            let is_short = text.chars().count() <= 40;
            let has_no_digits = !text.chars().any(|c| c.is_numeric());
            let has_letters = text.chars().any(|c| c.is_alphabetic());
            is_short && has_letters && has_no_digits
        })
        .count();

    textual as f64 / non_empty_count as f64
}

fn column_label(col_index: usize) -> String {
    let mut letters = String::new();
    let mut index = col_index as i64;
    loop {
        let remainder = (index % 26) as u8;
        letters.insert(0, (b'A' + remainder) as char);
        index = index / 26 - 1;
        if index < 0 {
            break;
        }
    }
    letters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_clipboard;

    fn analyze_text(content: &str) -> Analysis {
        let grid = read_clipboard(content).unwrap();
        analyze(&grid.rows, grid.total_columns)
    }

    #[test]
    fn test_column_label() {
        assert_eq!(column_label(0), "A");
        assert_eq!(column_label(1), "B");
        assert_eq!(column_label(25), "Z");
        assert_eq!(column_label(26), "AA");
        assert_eq!(column_label(27), "AB");
        assert_eq!(column_label(51), "AZ");
        assert_eq!(column_label(52), "BA");
    }

    #[test]
    fn test_column_type_detection() {
        let analysis = analyze_text(
            "Date\tDescription\tAmount\n01/02/2024\tSalary\t10000\n03/02/2024\tSupermarket\t-350.45",
        );
        assert_eq!(analysis.columns.len(), 3);
        assert!(analysis.columns[0].detected_types.contains(&ValueKind::Date));
        assert!(analysis.columns[0].detected_types.contains(&ValueKind::Text));
        assert!(analysis.columns[1].detected_types.contains(&ValueKind::Text));
        assert!(analysis.columns[2].detected_types.contains(&ValueKind::Number));
        assert_eq!(analysis.numeric_columns, vec![2]);
    }

    #[test]
    fn test_sample_values_capped_at_five() {
        let content = (0..10)
            .map(|i| format!("row {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let analysis = analyze_text(&content);
        assert_eq!(analysis.columns[0].sample_values.len(), 5);
    }

    #[test]
    fn test_empty_column_yields_empty_profile() {
        let analysis = analyze_text("a\t\tb\nc\t\td");
        let middle = &analysis.columns[1];
        assert!(middle.sample_values.is_empty());
        assert!(middle.detected_types.is_empty());
        assert!(middle.header_guess.is_none());
    }

    #[test]
    fn test_header_row_scores_full_marks() {
        let analysis = analyze_text("Date\tDescription\tAmount\n01/02/2024\tSalary\t100");
        let header = &analysis.rows[0];
        assert_eq!(header.header_like_score, 1.0);
        assert!(!header.auto_skip);
        assert_eq!(analysis.header_candidates[0], 0);
    }

    #[test]
    fn test_header_like_summary_row_is_not_auto_skipped() {
        // Trips the "balance" keyword but looks entirely like a header.
        let analysis = analyze_text("Date\tBalance\tAmount\n01/02/2024\tSalary\t100");
        let header = &analysis.rows[0];
        assert_eq!(header.skip_reasons, vec![SkipReason::SummaryRow]);
        assert_eq!(header.header_like_score, 1.0);
        assert!(!header.auto_skip);
    }

    #[test]
    fn test_summary_row_auto_skipped() {
        let analysis = analyze_text("a\tb\nTotal\t1250.00\t900.00\t350.00");
        let summary = &analysis.rows[1];
        assert_eq!(summary.skip_reasons, vec![SkipReason::SummaryRow]);
        assert!(summary.auto_skip);
    }

    #[test]
    fn test_hebrew_summary_keywords() {
        let analysis = analyze_text("a\tb\nסך הכל\t1250.00");
        assert_eq!(analysis.rows[1].skip_reasons, vec![SkipReason::SummaryRow]);
    }

    #[test]
    fn test_empty_and_short_rows() {
        let analysis = analyze_text("a\tb\n\nok\n01/02/2024\t100");
        assert_eq!(analysis.rows[1].skip_reasons, vec![SkipReason::EmptyRow]);
        assert_eq!(
            analysis.rows[2].skip_reasons,
            vec![SkipReason::ShortSingleValue]
        );
        assert!(analysis.rows[3].skip_reasons.is_empty());
    }

    #[test]
    fn test_metadata_row() {
        let analysis = analyze_text("Bank Hapoalim\tStatement Export\n01/02/2024\t100");
        assert_eq!(analysis.rows[0].skip_reasons, vec![SkipReason::MetadataRow]);
    }

    #[test]
    fn test_header_candidates_limited_and_sorted() {
        let analysis = analyze_text(
            "Date\tDescription\tAmount\n\
             01/02/2024\tSalary\t10000\n\
             One\tTwo\tThree\n\
             02/02/2024\tRent\t-3500",
        );
        // Both all-text rows outrank the data rows; candidate list keeps
        // score order.
        assert!(analysis.header_candidates.len() <= 5);
        assert_eq!(analysis.header_candidates[0], 0);
        assert_eq!(analysis.header_candidates[1], 2);
    }

    #[test]
    fn test_header_candidate_order_is_deterministic() {
        let content = "Date\tDescription\tAmount\n\
                       One\tTwo\tThree\n\
                       01/02/2024\tSalary\t10000";
        let first = analyze_text(content).header_candidates;
        for _ in 0..5 {
            assert_eq!(analyze_text(content).header_candidates, first);
        }
        // Equal scores keep encounter order.
        assert_eq!(first[0], 0);
        assert_eq!(first[1], 1);
    }

    #[test]
    fn test_header_guess_first_candidate_wins() {
        let analysis = analyze_text(
            "Date\tDescription\tAmount\n\
             Datum\tBeschreibung\tBetrag\n\
             01/02/2024\tSalary\t10000",
        );
        assert_eq!(analysis.columns[0].header_guess.as_deref(), Some("Date"));
        assert_eq!(
            analysis.columns[1].header_guess.as_deref(),
            Some("Description")
        );
    }

    #[test]
    fn test_detected_date_range_spans_all_columns() {
        let analysis = analyze_text(
            "01/02/2024\tSalary\t05/02/2024\n03/02/2024\tRent\t01/01/2024",
        );
        let range = analysis.detected_date_range;
        assert_eq!(
            range.min,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(
            range.max,
            chrono::NaiveDate::from_ymd_opt(2024, 2, 5)
        );
    }

    #[test]
    fn test_no_dates_yields_empty_range() {
        let analysis = analyze_text("a\tb\nc\td");
        assert!(analysis.detected_date_range.min.is_none());
        assert!(analysis.detected_date_range.max.is_none());
    }
}
