use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::Append;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {level} [{thread}] {target} - {m}{n}";
const ROLL_SIZE: u64 = 50 * 1024 * 1024;
const ROLL_COUNT: u32 = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogTarget {
    Console,
    /// Size-rolled log file, the rolled files sit next to it as `<path>.1`, `<path>.2`, ...
    RollingFile(PathBuf),
}

/// init log4rs
/// level value: ["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"], ignore ascii case
pub fn init_log(target: &LogTarget, level: &str) -> anyhow::Result<()> {
    let default_level = LevelFilter::from_str(level)
        .map_err(|e| anyhow!("can not parse log level `{}`. {}", level, e))?;

    let encoder = PatternEncoder::new(LOG_PATTERN);

    let (name, appender) = match target {
        LogTarget::Console => ("console", create_console_appender(encoder)),
        LogTarget::RollingFile(path) => {
            ("rolling_file", create_rolling_file_appender(path, encoder)?)
        }
    };

    let config = Config::builder()
        .appender(Appender::builder().build(name, appender))
        .build(Root::builder().appender(name).build(default_level))?;

    log4rs::init_config(config)?;
    Ok(())
}

fn create_console_appender(encoder: PatternEncoder) -> Box<dyn Append> {
    let stdout = ConsoleAppender::builder()
        .target(Target::Stdout)
        .encoder(Box::new(encoder))
        .build();
    Box::new(stdout)
}

fn create_rolling_file_appender(
    path: &Path,
    encoder: PatternEncoder,
) -> anyhow::Result<Box<dyn Append>> {
    let roll_path = format!("{}.{{}}", path.display());

    let trigger = SizeTrigger::new(ROLL_SIZE);
    let roll = FixedWindowRoller::builder()
        .base(1)
        .build(roll_path.as_str(), ROLL_COUNT)?;
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roll));

    let rolling_file = RollingFileAppender::builder()
        .encoder(Box::new(encoder))
        .append(true)
        .build(path, Box::new(policy))?;
    Ok(Box::new(rolling_file))
}

#[cfg(test)]
mod tests {
    use crate::runtime::logger::{init_log, LogTarget};

    #[test]
    pub fn invalid_level_test() {
        assert!(init_log(&LogTarget::Console, "verbose").is_err());
    }
}
