pub mod concurrency;
pub mod contact;
pub mod error;
pub mod integrator;
pub mod neighborhood_search;
pub mod particles;
pub mod scene;
pub mod simulation;
pub mod simulation_parameters;
pub mod spatial_grid;
pub mod thread_safe_ptr;

pub type IT = i32;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
    pub use std::f64::consts::PI;
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
    pub use std::f32::consts::PI;
}

use floating_type_mod::FT;

use nalgebra::SVector;

pub type V<FT, const D: usize> = SVector<FT, D>;

pub type V2 = V<FT, 2>;
pub type V2I = V<IT, 2>;

pub fn vec2f(x: FT, y: FT) -> V2 {
    [x, y].into()
}

pub use simulation::*;
