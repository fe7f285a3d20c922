//! `log4rs` initialisation.
//!
//! The builder logs each execution under `mongo_fluent::exec`, registry
//! lifecycle under `mongo_fluent::registry`, and one JSON event per operation
//! under `mongo_fluent::ops` at TRACE.

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

type InitResult = Result<(), Box<dyn std::error::Error>>;

/// Loads `log4rs.yaml` from the working directory.
///
/// # Errors
/// When the file is missing or invalid, or a logger is already installed.
pub fn init() -> InitResult {
    init_path(Path::new("log4rs.yaml"))
}

/// # Errors
/// When the file is missing or invalid, or a logger is already installed.
pub fn init_path(path: &Path) -> InitResult {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Parses `error|warn|info|debug|trace`; anything else is `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Console logging at `level`.
///
/// # Errors
/// When a logger is already installed.
pub fn init_console(level: &str) -> InitResult {
    let stdout = ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(PATTERN))).build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(parse_level(level)))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Rolling files under `dir`: `mongo_fluent.log` for everything and
/// `ops.log` for per-operation events. Each rolls at 10 MiB and keeps
/// `retention` old files.
///
/// # Errors
/// When `dir` cannot be created, an appender cannot open its file, or a logger
/// is already installed.
pub fn init_rolling(dir: &Path, level: &str, retention: u32) -> InitResult {
    std::fs::create_dir_all(dir)?;
    let config = rolling_config(dir, parse_level(level), retention)?;
    log4rs::init_config(config)?;
    Ok(())
}

fn rolling_appender(dir: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

pub(crate) fn rolling_config(
    dir: &Path,
    level: LevelFilter,
    retention: u32,
) -> Result<Config, Box<dyn std::error::Error>> {
    let keep = retention.max(1);
    let app = rolling_appender(dir, "mongo_fluent", keep)?;
    let ops = rolling_appender(dir, "ops", keep)?;
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("ops", Box::new(ops)))
        .logger(
            Logger::builder()
                .appender("ops")
                .additive(false)
                .build(crate::utils::devlog::OPS_TARGET, LevelFilter::Trace),
        )
        .build(Root::builder().appender("app").build(level))?;
    Ok(config)
}
