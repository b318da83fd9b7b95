//! Diagnostic output on stderr.
//!
//! Three output levels controlled by CLI flags:
//! - **Quiet** (`-q`): warnings and errors only
//! - **Default** (no flag): adds progress lines such as "wrote N symbols"
//! - **Verbose** (`-v`): everything, including the parser's own trace of
//!   which headers and symbols it resolved, and timings

use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Default = 1,
    Verbose = 2,
}

impl Verbosity {
    /// Picks the level for the `-q`/`-v` flags.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Default
        }
    }

    /// Returns the most detailed log level shown at this verbosity.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Warn,
            Self::Default => LevelFilter::Info,
            Self::Verbose => LevelFilter::Trace,
        }
    }
}

/// Writes log records to stderr; filtering is left to `log::max_level`.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error => eprintln!("error: {}", record.args()),
            Level::Warn => eprintln!("warning: {}", record.args()),
            Level::Info => eprintln!("{}", record.args()),
            Level::Debug | Level::Trace => {
                eprintln!("  [{}] {}", record.target(), record.args());
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Install the stderr logger for the current process.
pub fn init(quiet: bool, verbose: bool) -> Verbosity {
    let verbosity = Verbosity::from_flags(quiet, verbose);
    // Fails only if a logger is already installed, in which case it stays.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(verbosity.level_filter());
    }
    verbosity
}

/// RAII timer that logs the elapsed duration at debug level on drop.
///
/// ```ignore
/// let _t = Timer::start("symbol walk");
/// // ... work ...
/// // logs "symbol walk: 42ms" on drop, visible with -v
/// ```
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Begin timing a labeled operation.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::debug!("{}: {:.1?}", self.label, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_tiers() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Default);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert!(Verbosity::Quiet < Verbosity::Verbose);
    }

    #[test]
    fn tiers_map_to_levels() {
        assert_eq!(Verbosity::Quiet.level_filter(), LevelFilter::Warn);
        assert_eq!(Verbosity::Default.level_filter(), LevelFilter::Info);
        assert_eq!(Verbosity::Verbose.level_filter(), LevelFilter::Trace);
    }
}
