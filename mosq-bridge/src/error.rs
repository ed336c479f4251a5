use std::fmt::Write as _;

pub type Error = anyhow::Error;
pub type Result<T> = anyhow::Result<T, Error>;

/// Exit status used when the bridge cannot establish its execution context.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Startup failures after which the plugin must not keep running degraded.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("failed to resolve broker symbols")]
    BrokerSymbols(#[source] Error),
    #[error("failed to start script runtime")]
    RuntimeStart(#[source] Error),
    #[error("could not init script plugin")]
    InstanceInit(#[source] Error),
}

impl FatalError {
    /// The message followed by every error in the source chain, one per line.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(e) = source {
            let _ = write!(out, "\n  caused by: {}", e);
            source = e.source();
        }
        out
    }
}

/// Terminates the broker process after printing the diagnostic.
pub fn die(err: &FatalError) -> ! {
    let report = err.report();
    log::error!("{}", report);
    eprintln!("{}", report);
    std::process::exit(FATAL_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_report_includes_detail() {
        let err = FatalError::InstanceInit(anyhow!("ModuleNotFoundError: auth_rules"));
        let report = err.report();
        assert!(report.starts_with("could not init script plugin"));
        assert!(report.contains("caused by: ModuleNotFoundError: auth_rules"));
    }

    #[test]
    fn test_report_nested() {
        let err = FatalError::RuntimeStart(anyhow!("interpreter missing").context("embedding failed"));
        let report = err.report();
        assert!(report.contains("embedding failed"));
        assert!(report.contains("interpreter missing"));
    }
}
