use indicatif::MultiProgress;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::OnceLock;

static LOGGER: StderrLogger = StderrLogger;
static PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

/// Shared progress area. Bars added here are hidden while a log line is printed.
pub fn progress() -> &'static MultiProgress {
    PROGRESS.get_or_init(MultiProgress::new)
}

/// Install the stderr logger. Calling it twice keeps the first logger and only updates the level.
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_err() {
        log::debug!("Logger already installed");
    }
    log::set_max_level(level);
}

/// Map `-v`/`-q` counts onto a level, `Info` by default.
pub fn level_from_flags(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let line = format!(
            "{} {} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            tag,
            record.target(),
            record.args()
        );
        progress().suspend(|| eprintln!("{}", line));
    }

    fn flush(&self) {}
}
