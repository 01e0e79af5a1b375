mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "asset_tracker=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import {
            file,
            format,
            mode,
            dry_run,
        } => cli::import::run(&file, format.as_deref(), mode, dry_run),
        Commands::ImportJson {
            file,
            mode,
            dry_run,
        } => cli::import::run_json(&file, mode, dry_run),
        Commands::List { major, account } => cli::holdings::list(major, account),
        Commands::Export { output } => cli::holdings::export(output),
        Commands::Delete { id } => cli::holdings::delete(id),
        Commands::Canonicalize { names } => cli::rules::canonicalize_names(&names),
        Commands::Rules => cli::rules::list(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
