use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Script files, executed in order in one shared context
    pub scripts: Vec<PathBuf>,
    /// Expression to evaluate and print after the scripts ran (repeatable)
    #[arg(short, long = "eval", value_name = "EXPR")]
    pub eval: Vec<String>,
    /// Engine configuration (.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Print the global scope as JSON when done
    #[arg(long)]
    pub dump: bool,
    /// More log output; repeat for more detail (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Minimal `log` backend writing `LEVEL target: message` lines to stderr.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{:<5} {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the stderr logger. A second call only changes the level.
pub fn init_logging(level: LevelFilter) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
