//! Error types of the fingerprint core.
use std::path::PathBuf;

use cnfhash_dimacs::ParserError;

use thiserror::Error;

/// Invalid fingerprint settings, reported before any input is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_iterations must be at least 1")]
    MaxIterations,
}

/// Possible errors of the fingerprint entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {}", path.display(), source)]
    Parse {
        path: PathBuf,
        #[source]
        source: ParserError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Attach the offending path to a parse or IO failure.
    pub(crate) fn parse(path: impl Into<PathBuf>) -> impl FnOnce(ParserError) -> Error {
        let path = path.into();
        move |source| Error::Parse { path, source }
    }
}
