use clap::Parser;
use readaloud_cli::{Cli, CliError, Commands, bootstrap, handlers};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,readaloud_core=debug,readaloud_player=debug,readaloud_cli=debug"
    } else {
        "warn"
    }
}

fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // Logs go to stderr; stdout carries the sentences being read
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = bootstrap(&cli)?;

    match cli.command {
        Commands::Read {
            file,
            no_interactive,
        } => handlers::read::execute(&ctx, &file, !no_interactive).await?,
        Commands::Say { text } => handlers::say::execute(&ctx, &text.join(" ")).await?,
        Commands::Voices { json } => handlers::voices::execute(&ctx, json)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before parsing so READALOUD_* fallbacks see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        if let Some(cli_err) = err.downcast_ref::<CliError>() {
            eprintln!("Error: {cli_err}");
            std::process::exit(cli_err.exit_code());
        }
        return Err(err);
    }

    Ok(())
}
