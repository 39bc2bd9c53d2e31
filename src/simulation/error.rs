//! Error types for the DEM core.
//!
//! Configuration errors are raised before the first substep. Numerical
//! instability is raised by the substep that first produces a non-finite
//! position or velocity.

use std::fmt;

use crate::{floating_type_mod::FT, V2};

/// Errors detected while validating parameters or the initial particle store.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A Small particle does not fit into a single grid cell, so the 3x3 search
    /// would silently miss contacts.
    SmallParticleTooLarge { index: usize, diameter: FT, cell_size: FT },
    /// The damping coefficient is undefined outside of (0, 1).
    RestitutionOutOfRange(FT),
    /// Particle radii must be strictly positive.
    NonPositiveRadius { index: usize },
    /// Any other parameter with an invalid value.
    InvalidParameter { name: &'static str, reason: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::SmallParticleTooLarge {
                index,
                diameter,
                cell_size,
            } => write!(
                f,
                "small particle {} has diameter {} which is not smaller than the grid cell size {}",
                index, diameter, cell_size
            ),
            ConfigurationError::RestitutionOutOfRange(e) => {
                write!(f, "restitution coefficient {} is outside of the open interval (0, 1)", e)
            }
            ConfigurationError::NonPositiveRadius { index } => {
                write!(f, "particle {} has a non-positive radius", index)
            }
            ConfigurationError::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter '{}': {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors that stop a running simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Configuration(ConfigurationError),
    /// A position or velocity became NaN or infinite, usually because `dt` is
    /// too large for the contact stiffness.
    NumericalInstability {
        step: usize,
        particle: usize,
        position: V2,
        velocity: V2,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Configuration(e) => write!(f, "configuration error: {}", e),
            SimulationError::NumericalInstability {
                step,
                particle,
                position,
                velocity,
            } => write!(
                f,
                "numerical instability in substep {}: particle {} has position ({}, {}) and velocity ({}, {}). \
                 Try a smaller dt or a lower stiffness.",
                step, particle, position.x, position.y, velocity.x, velocity.y
            ),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Configuration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for SimulationError {
    fn from(e: ConfigurationError) -> Self {
        SimulationError::Configuration(e)
    }
}
