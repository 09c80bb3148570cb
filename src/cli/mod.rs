pub mod budget;
pub mod categories;
pub mod import;
pub mod init;
pub mod sources;

use clap::{Parser, Subcommand};

use crate::error::{FlowbookError, Result};

/// Parse a YYYY-MM period argument.
pub(crate) fn parse_month(month: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = month.split('-').collect();
    if parts.len() == 2 {
        if let (Ok(year), Ok(month)) = (parts[0].parse::<i32>(), parts[1].parse::<u32>()) {
            if (1..=12).contains(&month) {
                return Ok((year, month));
            }
        }
    }
    Err(FlowbookError::Other(format!(
        "Invalid month: {month} (expected YYYY-MM)"
    )))
}

#[derive(Parser)]
#[command(
    name = "flowbook",
    about = "Personal cash-flow tracker with a spreadsheet import wizard."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Flowbook: choose a data directory and initialize the database.
    Init {
        /// Path for Flowbook data (default: ~/Documents/flowbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage categories.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage cash-flow sources.
    Sources {
        #[command(subcommand)]
        command: SourcesCommands,
    },
    /// Plan and review monthly budgets.
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Import bank statements from files or pasted spreadsheet data.
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Add a new category.
    Add {
        /// Category name, e.g. 'Groceries'
        name: String,
        /// Category type: income, expense, both
        #[arg(long = "type")]
        category_type: String,
    },
    /// List all categories.
    List,
}

#[derive(Subcommand)]
pub enum SourcesCommands {
    /// Add a new cash-flow source.
    Add {
        /// Source name, e.g. 'Credit Card'
        name: String,
        /// Source type: income, expense
        #[arg(long = "type")]
        source_type: String,
        /// Whether opposite-direction rows (refunds) may land on this source
        #[arg(long = "allows-refunds")]
        allows_refunds: bool,
    },
    /// List all cash-flow sources.
    List,
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set the planned amount for a category or source in a month.
    Set {
        /// Category name
        #[arg(long, conflicts_with = "source")]
        category: Option<String>,
        /// Cash-flow source name
        #[arg(long)]
        source: Option<String>,
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
        /// Planned amount
        amount: f64,
    },
    /// List budgets for a month.
    List {
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
    },
}

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Read a statement file and open an import session.
    File {
        /// Path to an xlsx, xls, xlsm, csv or txt statement
        path: String,
    },
    /// Read tab-separated rows (pasted from a spreadsheet) and open an
    /// import session.
    Paste {
        /// Read from this file instead of stdin
        #[arg(long)]
        file: Option<String>,
    },
    /// Dry-run a column mapping against an open session.
    Preview {
        /// Session id printed by `import file` / `import paste`
        #[arg(long)]
        session: String,
        /// Path to the mapping/request JSON
        #[arg(long)]
        mapping: String,
    },
    /// Commit a mapped session to the ledger.
    Commit {
        /// Session id printed by `import file` / `import paste`
        #[arg(long)]
        session: String,
        /// Path to the mapping/request JSON
        #[arg(long)]
        mapping: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-02").unwrap(), (2024, 2));
        assert_eq!(parse_month("2024-12").unwrap(), (2024, 12));
        assert!(parse_month("2024").is_err());
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("feb-2024").is_err());
    }
}
