use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use smyklot::cli::{Cli, Commands, EventCommand, PollCommand};
use smyklot::{init_telemetry, BotConfig};

fn main() -> Result<()> {
    BotConfig::load_env_file()?;
    init_telemetry();

    let cli = Cli::parse();
    let config = BotConfig::load(&cli.config.overrides())?;

    tokio::runtime::Runtime::new()?.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling in-flight requests");
                interrupt.cancel();
            }
        });

        let result = match cli.command {
            Some(Commands::Poll(args)) => PollCommand::new(args, config)
                .execute(&cancel)
                .await
                .map(|report| {
                    info!(
                        examined = report.examined,
                        merged = report.merged,
                        errors = report.errors,
                        "Poll complete"
                    )
                }),
            None => EventCommand::new(cli.event, config).execute(&cancel).await,
        };

        if let Err(err) = &result {
            error!(error = %err, kind = ?err.kind(), "Smyklot run failed");
        }
        result.map_err(anyhow::Error::from)
    })
}
