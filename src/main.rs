use clap::Parser;
use flexi_logger::{AdaptiveFormat, Logger, WriteMode};
use lib_mnk::prelude::*;

fn main() -> anyhow::Result<()> {
    // Initialize program options and environment.
    dotenvy::dotenv().ok();
    let options = ServerOptions::parse();
    let _logger = Logger::try_with_env_or_str(options.log_level.clone().unwrap_or("info".into()).as_str())?
        .write_mode(WriteMode::BufferAndFlush)
        .log_to_stderr()
        .adaptive_format_for_stderr(
            match cfg!(debug_assertions) {
                true => AdaptiveFormat::WithThread,
                _    => AdaptiveFormat::Default
            })
        .start()?;

    // Serve the m,n,k,p,q game core over the line protocol.
    let service = GameService::new(&options);
    if let Err(e) = service.run() {
        log::error!("fatal error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
