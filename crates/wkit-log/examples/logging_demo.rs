//! Demonstrates the wkit logger with JSON output and a log file.

use std::path::PathBuf;
use wkit_log::{info, init, LogConfig, LogFormat, LogLevel, TraceContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LogConfig {
        level: LogLevel::Debug,
        format: LogFormat::Json,
        file_path: Some(PathBuf::from("/tmp/wkit-demo.log")),
        source_location: true,
        ..Default::default()
    };

    let logger = init(config)?;
    let ctx = TraceContext::new().with_trace_id("1881976623637467136");

    logger.msg("service starting").field("port", 8080).info();
    logger
        .msgf(format_args!("loaded {} routes", 12))
        .ctx(&ctx)
        .debug();

    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml");
    logger.msg("optional config missing").ctx(&ctx).err(&err).warn();

    // Plain tracing macros go through the installed logger too.
    info!(component = "demo", "done");

    println!("Environment config: {:?}", LogConfig::from_env());
    logger.shutdown()?;
    Ok(())
}
