mod analyzer;
mod budgets;
mod cli;
mod dates;
mod db;
mod error;
mod fmt;
mod models;
mod parser;
mod processor;
mod reader;
mod session;
mod settings;

use clap::Parser;

use cli::{BudgetCommands, CategoriesCommands, Cli, Commands, ImportCommands, SourcesCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Categories { command } => match command {
            CategoriesCommands::Add {
                name,
                category_type,
            } => cli::categories::add(&name, &category_type),
            CategoriesCommands::List => cli::categories::list(),
        },
        Commands::Sources { command } => match command {
            SourcesCommands::Add {
                name,
                source_type,
                allows_refunds,
            } => cli::sources::add(&name, &source_type, allows_refunds),
            SourcesCommands::List => cli::sources::list(),
        },
        Commands::Budget { command } => match command {
            BudgetCommands::Set {
                category,
                source,
                month,
                amount,
            } => cli::budget::set(category, source, &month, amount),
            BudgetCommands::List { month } => cli::budget::list(&month),
        },
        Commands::Import { command } => match command {
            ImportCommands::File { path } => cli::import::file(&path),
            ImportCommands::Paste { file } => cli::import::paste(file),
            ImportCommands::Preview { session, mapping } => {
                cli::import::preview(&session, &mapping)
            }
            ImportCommands::Commit { session, mapping } => {
                cli::import::commit(&session, &mapping)
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
