//! Logging setup

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global subscriber, writing to stderr so stdout carries only records
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let level: Level = level.parse()?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
