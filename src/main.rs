use clap::Parser;
use flexi_logger::{AdaptiveFormat, Logger, WriteMode};
use lib_eterna::prelude::*;

fn main() -> std::process::ExitCode {
    // Initialize program options and environment.
    let _ = dotenvy::dotenv();
    let options = SolveOptions::parse();
    let _logger = match Logger::try_with_env_or_str(
        options.log_level.clone().unwrap_or("info".into()).as_str(),
    )
    .map(|logger| {
        logger
            .write_mode(WriteMode::BufferAndFlush)
            .log_to_stderr()
            .adaptive_format_for_stderr(match cfg!(debug_assertions) {
                true => AdaptiveFormat::WithThread,
                _    => AdaptiveFormat::Default,
            })
            .set_palette("b196;208;195;111;67".to_owned())
    })
    .and_then(|logger| logger.start())
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return std::process::ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    // Run the search and map the outcome onto the documented exit codes.
    match SearchCoordinator::new(options).and_then(|c| c.run()) {
        Ok(summary) => {
            log::info!("{summary}");
            std::process::ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            log::error!("fatal error: {e:#}");
            std::process::ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}
