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
}

impl From<stampede_core::Error> for RunError {
    fn from(err: stampede_core::Error) -> Self {
        if err.is_configuration() {
            Self::InvalidInput(err.into())
        } else {
            Self::RuntimeError(err.into())
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_split_by_kind() {
        let cfg = RunError::from(stampede_core::Error::EmptyStages);
        assert_eq!(cfg.exit_code(), ExitCode::InvalidInput);

        let io = RunError::from(stampede_core::Error::Io(std::io::Error::other("disk")));
        assert_eq!(io.exit_code(), ExitCode::RuntimeError);
        assert!(io.to_string().contains("disk"));
    }
}
