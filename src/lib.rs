/*!
Core of a 2D granular DEM simulation: a parallel counting-sort grid, an
asymmetric broad phase for two particle size classes and a spring-damper
contact model.
*/

mod simulation;

pub use simulation::*;
