//! Run-scoped reporting.
//!
//! A [`Reporter`] lives exactly as long as one run and is passed by
//! reference to every component that can hit a soft failure. Each call
//! records the event and emits the matching `tracing` line, so a caller
//! can both read the log and summarise the run afterwards.

use std::cell::RefCell;
use std::error::Error;
use std::fmt;

use tracing::{error, warn};

/// Pipeline phase an archive failed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Discover,
    Remap,
    Metadata,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discover => "discover",
            Self::Remap => "remap",
            Self::Metadata => "metadata",
        })
    }
}

/// An archive that dropped out of the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub archive: String,
    pub phase: Phase,
    pub cause: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.archive, self.phase, self.cause)
    }
}

/// A record-level or advisory event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub archive: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Reporter {
    failures: RefCell<Vec<Failure>>,
    skipped: RefCell<Vec<Notice>>,
    advisories: RefCell<Vec<Notice>>,
}

/// Render an error together with its source chain.
pub fn describe(err: &dyn Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// An archive is excluded from the rest of the run.
    pub fn archive_failed(&self, archive: &str, phase: Phase, cause: &dyn Error) {
        let cause = describe(cause);
        error!(archive, %phase, %cause, "skipping archive");
        self.failures.borrow_mut().push(Failure {
            archive: archive.to_string(),
            phase,
            cause,
        });
    }

    /// One record inside an archive was skipped; the archive continues.
    pub fn record_skipped(&self, archive: &str, cause: &dyn Error) {
        let message = describe(cause);
        warn!(archive, %message, "skipping record");
        self.skipped.borrow_mut().push(Notice {
            archive: archive.to_string(),
            message,
        });
    }

    pub fn advisory(&self, archive: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(archive, "{message}");
        self.advisories.borrow_mut().push(Notice {
            archive: archive.to_string(),
            message,
        });
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.failures.borrow().clone()
    }

    pub fn skipped(&self) -> Vec<Notice> {
        self.skipped.borrow().clone()
    }

    pub fn advisories(&self) -> Vec<Notice> {
        self.advisories.borrow().clone()
    }

    pub fn failed(&self, archive: &str) -> bool {
        self.failures.borrow().iter().any(|f| f.archive == archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("cannot open archive")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn failures_keep_the_cause_chain() {
        let reporter = Reporter::new();
        let err = Outer(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        reporter.archive_failed("a.jar", Phase::Remap, &err);
        let failures = reporter.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].cause, "cannot open archive: gone");
        assert_eq!(failures[0].to_string(), "a.jar (remap): cannot open archive: gone");
        assert!(reporter.failed("a.jar"));
        assert!(!reporter.failed("b.jar"));
    }

    #[test]
    fn notices_are_kept_apart() {
        let reporter = Reporter::new();
        reporter.advisory("a.jar", "unknown marker");
        reporter.record_skipped("a.jar", &std::io::Error::new(std::io::ErrorKind::Other, "bad rule"));
        assert_eq!(reporter.advisories().len(), 1);
        assert_eq!(reporter.skipped()[0].message, "bad rule");
        assert!(reporter.failures().is_empty());
    }
}
