use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vaultai::cli::commands::edit::EntryChanges;
use vaultai::cli::{load_settings, output, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing: VAULTAI_LOG, then --verbose, then the config file.
    let filter = EnvFilter::try_from_env("VAULTAI_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("vaultai=debug")
        } else {
            let configured = load_settings().map(|s| s.log_filter).unwrap_or_default();
            EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("vaultai=warn"))
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Add {
            ref site,
            ref username,
            ref password,
            ref note,
        } => vaultai::cli::commands::add::execute(&cli, site, username, password.as_deref(), note),
        Commands::Edit {
            ref site,
            ref username,
            ref new_site,
            ref new_username,
            ref password,
            ref note,
        } => {
            let changes = EntryChanges {
                site: new_site.as_deref(),
                username: new_username.as_deref(),
                password: password.as_deref(),
                note: note.as_deref(),
            };
            vaultai::cli::commands::edit::execute(&cli, site, username, &changes)
        }
        Commands::List { show_passwords } => {
            vaultai::cli::commands::list::execute(&cli, show_passwords)
        }
        Commands::Delete {
            ref site,
            ref username,
            force,
        } => vaultai::cli::commands::delete::execute(&cli, site, username, force),
        Commands::ChangePassword => vaultai::cli::commands::rotate::execute(&cli),
        Commands::Export { output: ref path } => vaultai::cli::commands::export::execute(&cli, path),
        Commands::Import {
            ref file,
            ref policy,
        } => vaultai::cli::commands::import_cmd::execute(&cli, file, policy.as_deref()),
        Commands::Reset { force } => vaultai::cli::commands::reset::execute(&cli, force),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
