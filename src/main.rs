mod adapters;
mod cli;
mod error;
mod fmt;
mod models;
mod patterns;
mod processing;
mod reconcile;
mod reports;
mod session;
mod settings;
mod store;
mod validation;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::TallyError;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let settings = settings::load_settings();
    let root = cli::resolve_data_dir(cli.data_dir, &settings);

    let result = match cli.command.unwrap_or(Commands::Categorize) {
        Commands::Categorize => cli::categorize::run(&root, &settings),
        Commands::Check => cli::check::run(&root, &settings),
        Commands::Report => cli::report::run(&root, &settings),
        Commands::Accounts => cli::accounts::list(&settings),
    };

    match result {
        Ok(()) => {}
        Err(TallyError::Aborted) => {
            eprintln!("{}", TallyError::Aborted);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
