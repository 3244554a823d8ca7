use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => e,
        }
    }

    /// Classifies an engine error: anything rejected before workers spawn is bad input.
    pub fn from_core(err: stampede_core::Error) -> Self {
        use stampede_core::Error;

        match err {
            Error::NoScenarios
            | Error::DuplicateScenario(_)
            | Error::InvalidVus { .. }
            | Error::InvalidIterations { .. }
            | Error::InvalidDuration { .. }
            | Error::InvalidStages { .. }
            | Error::InvalidExecutor(_)
            | Error::InvalidThreshold { .. } => Self::InvalidInput(anyhow::Error::new(err)),
            Error::Join(_) | Error::Metrics(_) => Self::RuntimeError(anyhow::Error::new(err)),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}
