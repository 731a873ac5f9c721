use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use halma::config::{Cli, Command, SessionConfig, Settings};
use halma::controller::Controller;
use halma::engine;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    // Fatal errors have already torn the session down by the time they
    // reach this point; report and exit nonzero.
    if let Err(err) = run(cli) {
        tracing::error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // The engine child re-enters here through its hidden subcommand.
    if let Some(Command::Engine(args)) = &cli.command {
        return engine::run(&args.to_search_options());
    }

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    // Run the session
    let config = SessionConfig::from_cli(&cli);
    Controller::new(config, settings)?.run()
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("halma=debug,halma_core=debug")
    } else {
        EnvFilter::new("halma=info,halma_core=info")
    };

    // stdout carries the result line and the tournament feed; diagnostics
    // go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
