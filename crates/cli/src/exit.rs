use engine_processing::orchestrator::RunOutcome;

/// Exit codes for the CLI application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
    /// The source had no rows for the date; nothing was changed.
    NoData = 3,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&RunOutcome> for ExitCode {
    fn from(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Loaded(_) => ExitCode::Success,
            RunOutcome::EmptySource { .. } => ExitCode::NoData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_is_distinguishable() {
        let outcome = RunOutcome::EmptySource { attempts: 1 };
        assert_eq!(ExitCode::from(&outcome).as_i32(), 3);
        assert_eq!(ExitCode::Failure.as_i32(), 1);
    }
}
