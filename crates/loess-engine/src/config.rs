//! Simulation configuration, validation, and error types.
//!
//! [`SimulationConfig`] is the builder-input for constructing a
//! [`Simulation`](crate::Simulation). [`validate()`](SimulationConfig::validate)
//! checks scalar invariants; the constructor additionally validates the
//! assembled pipeline and the supplied parameter arrays.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use loess_core::{Domain, DomainError, StepError};
use loess_propagator::{PipelineError, Propagator};
use loess_propagators::{SettlingParams, YieldCoefficients};
use loess_restart::RestartState;

use crate::stage::Stage;

// ── FeatureFlags ───────────────────────────────────────────────────

/// Boolean switches for the optional sub-systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Erosion and sediment transport. Default: off.
    pub water_quality: bool,
    /// Channel routing. Default: on.
    pub routing: bool,
    /// Lakes and reservoirs. Default: off.
    pub waterbodies: bool,
    /// Small lakes. Default: off.
    pub small_lakes: bool,
    /// Water-demand abstraction from channels. Default: off.
    pub water_demand: bool,
    /// Runoff concentration. Default: off.
    pub runoff_concentration: bool,
    /// Run environmental flow and output once, then terminate.
    pub environmental_flow_only: bool,
    /// Forcing ingestion and output only; state is not advanced.
    pub calibration: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            water_quality: false,
            routing: true,
            waterbodies: false,
            small_lakes: false,
            water_demand: false,
            runoff_concentration: false,
            environmental_flow_only: false,
            calibration: false,
        }
    }
}

// ── SedimentParams ─────────────────────────────────────────────────

/// Calibration constants of the sediment core.
///
/// `csp` and `a05` have no default and must be set when water quality
/// is enabled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SedimentParams {
    /// Yield power-law constants (default `a = 11.8`, `b = 0.56`).
    pub yield_coefficients: YieldCoefficients,
    /// Transport capacity coefficient.
    pub csp: Option<f64>,
    /// Transport capacity exponent. Default: 1.5.
    pub spexp: f64,
    /// Half-hour rainfall fraction.
    pub a05: Option<f64>,
    /// Waterbody settling constants.
    pub settling: SettlingParams,
}

impl Default for SedimentParams {
    fn default() -> Self {
        Self {
            yield_coefficients: YieldCoefficients::default(),
            csp: None,
            spexp: 1.5,
            a05: None,
            settling: SettlingParams::default(),
        }
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Complete configuration for constructing a [`Simulation`](crate::Simulation).
///
/// Static and persistent field values are supplied by name in
/// `parameters`. A single value is broadcast to the whole field; any
/// other length must match the field's layout exactly.
pub struct SimulationConfig {
    /// Active cells, waterbody cells, and routing sub-steps.
    pub domain: Domain,
    /// Step length in seconds. Default: 86400.
    pub dt: f64,
    /// Optional sub-system switches.
    pub flags: FeatureFlags,
    /// Sediment calibration constants.
    pub sediment: SedimentParams,
    /// Field values by field name.
    pub parameters: IndexMap<String, Vec<f64>>,
    /// Collaborator propagators, each bound to a stage.
    pub collaborators: Vec<(Stage, Box<dyn Propagator>)>,
    /// Absolute tolerance of the mass-balance checks. Default: 1e-6.
    pub mass_balance_tolerance: f64,
    /// State to resume from.
    pub restart: Option<RestartState>,
}

impl SimulationConfig {
    /// A daily configuration over `domain` with every default.
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            dt: 86_400.0,
            flags: FeatureFlags::default(),
            sediment: SedimentParams::default(),
            parameters: IndexMap::new(),
            collaborators: Vec::new(),
            mass_balance_tolerance: 1.0e-6,
            restart: None,
        }
    }

    /// Set a field's values by name.
    pub fn parameter(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.parameters.insert(name.into(), values);
        self
    }

    /// Register a collaborator at `stage`.
    pub fn collaborator(mut self, stage: Stage, propagator: Box<dyn Propagator>) -> Self {
        self.collaborators.push((stage, propagator));
        self
    }

    /// Check scalar invariants without building anything.
    ///
    /// # Errors
    ///
    /// Fails on an empty domain, a bad tolerance, or a missing or
    /// out-of-range calibration constant for an enabled sub-system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.cell_count() == 0 {
            return Err(ConfigError::EmptyDomain);
        }
        if !self.mass_balance_tolerance.is_finite() || self.mass_balance_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance {
                value: self.mass_balance_tolerance,
            });
        }
        if self.flags.water_quality {
            let a05 = self.sediment.a05.ok_or(ConfigError::MissingParameter {
                name: "a05".to_string(),
            })?;
            if !a05.is_finite() || !(0.0..=1.0).contains(&a05) {
                return Err(ConfigError::InvalidCalibration {
                    reason: format!("a05 must be within [0, 1], got {a05}"),
                });
            }
            if self.flags.routing && self.sediment.csp.is_none() {
                return Err(ConfigError::MissingParameter {
                    name: "csp".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SimulationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let collaborators: Vec<String> = self
            .collaborators
            .iter()
            .map(|(stage, p)| format!("{}:{}", stage.name(), p.name()))
            .collect();
        f.debug_struct("SimulationConfig")
            .field("domain", &self.domain)
            .field("dt", &self.dt)
            .field("flags", &self.flags)
            .field("sediment", &self.sediment)
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .field("collaborators", &collaborators)
            .field("mass_balance_tolerance", &self.mass_balance_tolerance)
            .field("restart", &self.restart.as_ref().map(|r| r.step_id))
            .finish()
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while constructing a simulation. All are fatal.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Pipeline validation failed.
    Pipeline(PipelineError),
    /// The domain could not be built.
    Domain(DomainError),
    /// The domain has no active cells.
    EmptyDomain,
    /// A field definition is structurally invalid.
    InvalidField {
        /// Description of the problem.
        reason: String,
    },
    /// A required value has no default and was not supplied.
    MissingParameter {
        /// Field or constant name.
        name: String,
    },
    /// A parameter names no registered field.
    UnknownParameter {
        /// The unrecognised name.
        name: String,
    },
    /// A parameter array does not fit its field.
    ParameterLength {
        /// Field name.
        name: String,
        /// Field length.
        expected: usize,
        /// Supplied length.
        got: usize,
    },
    /// A parameter array contains NaN or infinity.
    NonFiniteParameter {
        /// Field name.
        name: String,
        /// First offending element.
        index: usize,
    },
    /// A calibration constant is out of range.
    InvalidCalibration {
        /// Description of the problem.
        reason: String,
    },
    /// The mass-balance tolerance is negative or not finite.
    InvalidTolerance {
        /// The rejected value.
        value: f64,
    },
    /// A per-step propagator writes a static field.
    StaticFieldWritten {
        /// The offending propagator.
        propagator: String,
        /// The static field.
        field: String,
    },
    /// The one-off erosion set-up failed.
    Setup(StepError),
    /// The restart state does not fit this simulation.
    RestartMismatch {
        /// Description of the mismatch.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline(e) => write!(f, "pipeline: {e}"),
            Self::Domain(e) => write!(f, "domain: {e}"),
            Self::EmptyDomain => write!(f, "domain has no active cells"),
            Self::InvalidField { reason } => write!(f, "invalid field: {reason}"),
            Self::MissingParameter { name } => write!(f, "missing required parameter '{name}'"),
            Self::UnknownParameter { name } => write!(f, "unknown parameter '{name}'"),
            Self::ParameterLength {
                name,
                expected,
                got,
            } => write!(
                f,
                "parameter '{name}' has {got} values, expected 1 or {expected}"
            ),
            Self::NonFiniteParameter { name, index } => {
                write!(f, "parameter '{name}' is not finite at element {index}")
            }
            Self::InvalidCalibration { reason } => write!(f, "invalid calibration: {reason}"),
            Self::InvalidTolerance { value } => {
                write!(f, "mass-balance tolerance must be finite and >= 0, got {value}")
            }
            Self::StaticFieldWritten { propagator, field } => {
                write!(f, "propagator '{propagator}' writes static field '{field}'")
            }
            Self::Setup(e) => write!(f, "erosion set-up: {e}"),
            Self::RestartMismatch { reason } => write!(f, "restart state mismatch: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pipeline(e) => Some(e),
            Self::Domain(e) => Some(e),
            Self::Setup(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for ConfigError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl From<DomainError> for ConfigError {
    fn from(e: DomainError) -> Self {
        Self::Domain(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality_config() -> SimulationConfig {
        let mut config = SimulationConfig::new(Domain::new(4));
        config.flags.water_quality = true;
        config.sediment.a05 = Some(0.5);
        config.sediment.csp = Some(1.0e-4);
        config
    }

    #[test]
    fn defaults_validate() {
        assert!(SimulationConfig::new(Domain::new(1)).validate().is_ok());
        assert!(quality_config().validate().is_ok());
    }

    #[test]
    fn empty_domain_rejected() {
        assert_eq!(
            SimulationConfig::new(Domain::new(0)).validate(),
            Err(ConfigError::EmptyDomain)
        );
    }

    #[test]
    fn missing_a05_is_fatal() {
        let mut config = quality_config();
        config.sediment.a05 = None;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingParameter {
                name: "a05".to_string()
            })
        );
    }

    #[test]
    fn csp_only_required_with_routing() {
        let mut config = quality_config();
        config.sediment.csp = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingParameter { ref name }) if name == "csp"
        ));
        config.flags.routing = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn a05_out_of_range() {
        let mut config = quality_config();
        config.sediment.a05 = Some(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCalibration { .. })
        ));
    }

    #[test]
    fn negative_tolerance_rejected() {
        let mut config = SimulationConfig::new(Domain::new(2));
        config.mass_balance_tolerance = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTolerance { .. })
        ));
    }

    #[test]
    fn debug_lists_collaborator_names() {
        let config = SimulationConfig::new(Domain::new(1)).parameter("cell_area", vec![1.0]);
        let text = format!("{config:?}");
        assert!(text.contains("cell_area"));
    }

    #[test]
    fn errors_display() {
        let e = ConfigError::ParameterLength {
            name: "k_factor".to_string(),
            expected: 10,
            got: 3,
        };
        assert_eq!(
            e.to_string(),
            "parameter 'k_factor' has 3 values, expected 1 or 10"
        );
    }

    #[test]
    fn domain_errors_convert_with_source() {
        fn lakes(cells: Vec<usize>) -> Result<SimulationConfig, ConfigError> {
            Ok(SimulationConfig::new(Domain::new(3).with_waterbodies(cells)?))
        }
        assert!(lakes(vec![0, 2]).is_ok());
        let err = lakes(vec![3]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Domain(DomainError::WaterbodyOutOfRange {
                cell: 3,
                cell_count: 3
            })
        );
        assert_eq!(
            err.to_string(),
            "domain: waterbody cell 3 out of range for 3 active cells"
        );
        assert!(err.source().is_some());
    }
}
