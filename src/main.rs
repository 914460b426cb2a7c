use clap::Parser;
use tracing_subscriber::EnvFilter;
use vaultpass::cli::{Cli, Commands};

fn main() {
    // Diagnostics go to stderr; `VAULTPASS_LOG=debug` for engine detail.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VAULTPASS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => vaultpass::cli::commands::init::execute(&cli),
        Commands::Set {
            ref account,
            ref value,
            ref login,
            ref field,
        } => vaultpass::cli::commands::set::execute(
            &cli,
            account,
            value.as_deref(),
            login.as_deref(),
            field.as_deref(),
        ),
        Commands::Get {
            ref account,
            ref field,
        } => vaultpass::cli::commands::get::execute(&cli, account, field.as_deref()),
        Commands::History { ref account } => {
            vaultpass::cli::commands::history::execute(&cli, account)
        }
        Commands::Rekey => vaultpass::cli::commands::rekey::execute(&cli),
        Commands::Audit { last, ref since } => {
            vaultpass::cli::commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
    };

    if let Err(e) = result {
        vaultpass::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
