//! Fingerprint configuration.
use crate::error::ConfigError;

/// Configurable parameters of the isomorphism-invariant fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct IsoHash2Settings {
    /// Upper bound on color refinement rounds.
    ///
    /// [default: 6]
    pub max_iterations: u32,

    /// Emit per-round diagnostics through the `log` facade.
    ///
    /// [default: false]
    pub print_stats: bool,
}

impl Default for IsoHash2Settings {
    fn default() -> IsoHash2Settings {
        IsoHash2Settings {
            max_iterations: 6,
            print_stats: false,
        }
    }
}

impl IsoHash2Settings {
    /// Check the settings before any input is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::MaxIterations);
        }
        Ok(())
    }
}
