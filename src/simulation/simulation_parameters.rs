use crate::{error::ConfigurationError, floating_type_mod::FT, vec2f, V2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    // number of grid cells per axis over the [0,1]x[0,1] domain
    pub grid_n: usize,

    // mass = density * PI * r^2
    pub density: FT,

    // spring constant of the contact model
    pub stiffness: FT,

    // particle-particle restitution, has to be in (0, 1)
    pub restitution_coef: FT,

    // wall restitution (independent from `restitution_coef`)
    pub bounce_coef: FT,

    pub gravity: FT,
    pub dt: FT,

    // number of substeps per displayed frame
    pub substeps: usize,

    // slow: verify the grid partition after every rebuild
    #[serde(default)]
    pub check_partition: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            grid_n: 64,
            density: 100.,
            stiffness: 8e3,
            restitution_coef: 0.001,
            bounce_coef: 0.3,
            gravity: -9.81,
            dt: 1e-4,
            substeps: 60,
            check_partition: false,
        }
    }
}

impl SimulationParams {
    pub fn cell_size(&self) -> FT {
        1. / self.grid_n as FT
    }

    pub fn gravity_vector(&self) -> V2 {
        vec2f(0., self.gravity)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.restitution_coef > 0. && self.restitution_coef < 1.) {
            return Err(ConfigurationError::RestitutionOutOfRange(self.restitution_coef));
        }
        if self.grid_n == 0 {
            return Err(invalid("grid_n", "the grid needs at least one cell per axis"));
        }
        if self.grid_n > u32::MAX as usize {
            return Err(invalid("grid_n", "cell indices have to fit into 32 bits"));
        }
        if !(self.dt > 0.) || !self.dt.is_finite() {
            return Err(invalid("dt", format!("expected a positive timestep, got {}", self.dt)));
        }
        if !(self.stiffness > 0.) || !self.stiffness.is_finite() {
            return Err(invalid(
                "stiffness",
                format!("expected a positive stiffness, got {}", self.stiffness),
            ));
        }
        if !(self.density > 0.) || !self.density.is_finite() {
            return Err(invalid("density", format!("expected a positive density, got {}", self.density)));
        }
        if !(0. ..=1.).contains(&self.bounce_coef) {
            return Err(invalid(
                "bounce_coef",
                format!("expected a value in [0, 1], got {}", self.bounce_coef),
            ));
        }
        if !self.gravity.is_finite() {
            return Err(invalid("gravity", "gravity has to be finite"));
        }
        if self.substeps == 0 {
            return Err(invalid("substeps", "a frame needs at least one substep"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}
