use crate::concurrency::{into_par_iter, par_iter_mut1};
use crate::simulation::contact::{Contact, ContactModel};
use crate::simulation::error::{ConfigurationError, SimulationError};
use crate::simulation::integrator::{check_finite, enforce_boundary, integrate};
use crate::simulation::neighborhood_search::NeighborQuery;
use crate::simulation::particles::{ParticleClass, ParticleVec};
use crate::simulation::simulation_parameters::SimulationParams;
use crate::simulation::spatial_grid::SpatialGrid;
use crate::{floating_type_mod::FT, V2};

use rayon::iter::ParallelIterator;

use log::{debug, error, info, trace};
use num_traits::Float;

use std::collections::HashMap;
use std::fmt::{Display, Write};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Counter<T> {
    values: Vec<T>,
    last_start: Instant,
}
impl<T> Counter<T> {
    fn new() -> Self {
        Counter::<T> {
            last_start: Instant::now(),
            values: Vec::new(),
        }
    }
    fn add_value(&mut self, v: T) {
        self.values.push(v);
    }
}
impl Counter<FT> {
    fn avg(&self) -> FT {
        self.values.iter().cloned().sum::<FT>() / self.values.len() as FT
    }
    fn min(&self) -> FT {
        self.values.iter().cloned().fold(FT::max_value(), |a, b| FT::min(a, b))
    }
    fn max(&self) -> FT {
        self.values.iter().cloned().fold(FT::min_value(), |a, b| FT::max(a, b))
    }
}
impl Counter<Duration> {
    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) {
        self.values.push(Instant::now() - self.last_start);
    }

    fn avg(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>() / self.values.len() as u32
    }

    fn sum(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>()
    }
}

struct ValueCounters {
    counters: HashMap<String, Counter<FT>>,
    enabled: bool,
}
impl ValueCounters {
    fn new(enabled: bool) -> ValueCounters {
        ValueCounters {
            counters: HashMap::default(),
            enabled,
        }
    }

    fn add_value(&mut self, id: &str, v: FT) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<FT>::new)
                .add_value(v);
        }
    }
}

struct PerformanceCounters {
    counters: HashMap<String, Counter<Duration>>,
    enabled: bool,
}
impl PerformanceCounters {
    fn new(enabled: bool) -> PerformanceCounters {
        PerformanceCounters {
            counters: HashMap::default(),
            enabled,
        }
    }

    fn begin(&mut self, id: &str) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<Duration>::new)
                .begin();
        }
    }
    fn end(&mut self, id: &str) {
        if self.enabled {
            if let Some(counter) = self.counters.get_mut(id) {
                counter.end();
            }
        }
    }
}

/// Summary of one contact pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactStatistics {
    pub contact_count: usize,
    pub max_penetration: FT,
}

impl ContactStatistics {
    fn zero() -> ContactStatistics {
        ContactStatistics {
            contact_count: 0,
            max_penetration: 0.,
        }
    }

    fn for_contact(delta: FT) -> ContactStatistics {
        ContactStatistics {
            contact_count: 1,
            max_penetration: delta,
        }
    }

    fn combine(self, other: ContactStatistics) -> ContactStatistics {
        ContactStatistics {
            contact_count: self.contact_count + other.contact_count,
            max_penetration: FT::max(self.max_penetration, other.max_penetration),
        }
    }
}

pub struct DemSimulation {
    pub particles: ParticleVec,
    params: SimulationParams,
    grid: SpatialGrid,
    query: NeighborQuery,
    contact_model: ContactModel,
    last_contact_statistics: ContactStatistics,

    pcounters: PerformanceCounters,
    vcounters: ValueCounters,

    step_number: usize,
}

impl DemSimulation {
    /// Validates the parameters and the populated particle store, then seeds the
    /// force accumulators for the first substep.
    pub fn new(
        params: SimulationParams,
        particles: ParticleVec,
        counters_enabled: bool,
    ) -> Result<DemSimulation, SimulationError> {
        params.validate()?;
        validate_particles(&particles, &params)?;

        let grid = SpatialGrid::new(params.grid_n);
        let query = NeighborQuery::for_particles(&particles, params.cell_size());

        info!(
            "INIT {} PARTICLES ({} small, {} large) on a {}x{} grid",
            particles.len(),
            particles.count_class(ParticleClass::Small),
            particles.count_class(ParticleClass::Large),
            params.grid_n,
            params.grid_n
        );
        info!(
            "search half-width: small=1 large={}",
            query.search_half_width(ParticleClass::Large)
        );

        let mut simulation = DemSimulation {
            particles,
            params,
            grid,
            query,
            contact_model: ContactModel::new(params.stiffness, params.restitution_coef),
            last_contact_statistics: ContactStatistics::zero(),
            pcounters: PerformanceCounters::new(counters_enabled),
            vcounters: ValueCounters::new(counters_enabled),
            step_number: 0,
        };

        simulation.rebuild_grid();
        simulation.last_contact_statistics = simulation.compute_contact_forces();

        Ok(simulation)
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn step_number(&self) -> usize {
        self.step_number
    }

    pub fn time(&self) -> FT {
        self.step_number as FT * self.params.dt
    }

    pub fn positions(&self) -> &[V2] {
        &self.particles.position
    }

    pub fn velocities(&self) -> &[V2] {
        &self.particles.velocity
    }

    pub fn radii(&self) -> &[FT] {
        &self.particles.radius
    }

    pub fn classes(&self) -> &[ParticleClass] {
        &self.particles.class
    }

    pub fn last_contact_statistics(&self) -> ContactStatistics {
        self.last_contact_statistics
    }

    /// Integrate, reflect at the walls, check for blow-up, rebuild the grid and
    /// compute the forces for the next substep.
    pub fn substep(&mut self) -> Result<(), SimulationError> {
        self.pcounters.begin("simulation-step");

        self.pcounters.begin("integrate");
        integrate(&mut self.particles, self.params.dt);
        enforce_boundary(&mut self.particles, self.params.bounce_coef);
        self.pcounters.end("integrate");

        self.step_number += 1;

        if let Err(e) = check_finite(&self.particles, self.step_number) {
            error!("{}", e);
            return Err(e);
        }

        self.pcounters.begin("grid-rebuild");
        self.rebuild_grid();
        self.pcounters.end("grid-rebuild");

        self.pcounters.begin("contact-pass");
        let statistics = self.compute_contact_forces();
        self.pcounters.end("contact-pass");

        self.last_contact_statistics = statistics;
        self.vcounters.add_value("contact-count", statistics.contact_count as FT);
        self.vcounters.add_value("max-penetration", statistics.max_penetration);

        trace!(
            "substep {}: {} contacts, max penetration {}",
            self.step_number,
            statistics.contact_count,
            statistics.max_penetration
        );

        self.pcounters.end("simulation-step");
        Ok(())
    }

    /// Runs `substeps` substeps. Afterwards positions, radii and velocities
    /// describe the next displayed frame.
    pub fn frame(&mut self) -> Result<(), SimulationError> {
        for _ in 0..self.params.substeps {
            self.substep()?;
        }

        let kinetic_energy = self.particles.kinetic_energy();
        self.vcounters.add_value("kinetic-energy", kinetic_energy);
        debug!(
            "frame at t={:.4}s: kinetic energy {:e}, {} contacts, max penetration {:e}",
            self.time(),
            kinetic_energy,
            self.last_contact_statistics.contact_count,
            self.last_contact_statistics.max_penetration
        );
        Ok(())
    }

    fn rebuild_grid(&mut self) {
        self.grid.rebuild(&self.particles.position);

        if self.params.check_partition {
            debug!("=====> SLOW: CHECK GRID PARTITION <=====");
            self.grid.assert_partition(&self.particles.position);
        }
    }

    /// Resets every force to gravity and adds the contact forces of all resolved
    /// pairs. Expects an up-to-date grid.
    pub fn compute_contact_forces(&mut self) -> ContactStatistics {
        let gravity = self.params.gravity_vector();
        {
            let mass = &self.particles.mass;
            par_iter_mut1(&mut self.particles.force, |i, p_force| {
                p_force.set(gravity * mass[i]);
            });
        }

        let particles = &self.particles;
        let grid = &self.grid;
        let query = self.query;
        let contact_model = self.contact_model;

        into_par_iter(0..particles.len())
            .map(|i| {
                let mut statistics = ContactStatistics::zero();
                query.for_each_resolved_pair(grid, particles, i, |j| {
                    let contact = match Contact::detect(
                        particles.position[i],
                        particles.radius[i],
                        particles.position[j],
                        particles.radius[j],
                    ) {
                        Some(contact) => contact,
                        None => return,
                    };

                    let f = contact_model.force_on_i(
                        &contact,
                        particles.velocity[i],
                        particles.velocity[j],
                        particles.mass[i],
                        particles.mass[j],
                    );
                    particles.force[i].add(f);
                    particles.force[j].sub(f);

                    statistics = statistics.combine(ContactStatistics::for_contact(contact.delta));
                });
                statistics
            })
            .reduce(ContactStatistics::zero, ContactStatistics::combine)
    }
}

fn validate_particles(particles: &ParticleVec, params: &SimulationParams) -> Result<(), ConfigurationError> {
    let cell_size = params.cell_size();
    for i in 0..particles.len() {
        let r = particles.radius[i];
        if !(r > 0.) {
            return Err(ConfigurationError::NonPositiveRadius { index: i });
        }
        if particles.class[i] == ParticleClass::Small && 2. * r >= cell_size {
            return Err(ConfigurationError::SmallParticleTooLarge {
                index: i,
                diameter: 2. * r,
                cell_size,
            });
        }
    }
    Ok(())
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}

pub fn write_statistics(simulation: &DemSimulation) -> String {
    let mut s = String::new();

    let simulation_time = simulation
        .pcounters
        .counters
        .get("simulation-step")
        .map_or(0., |c| c.sum().as_secs_f64());

    writeln!(s, "simulation-time: {}ms", simulation_time * 1000.).unwrap();
    writeln!(s, "substeps: {}", simulation.step_number).unwrap();
    writeln!(s, "particles: {}", simulation.particles.len()).unwrap();
    writeln!(s).unwrap();

    let mut v = simulation.pcounters.counters.iter().collect::<Vec<_>>();
    v.sort_by(|x, y| x.0.cmp(y.0));
    for (label, pcounter) in v {
        if pcounter.values.is_empty() {
            continue;
        }
        writeln!(s, "{}: avg:{}ms", label, pcounter.avg().as_secs_f64() * 1000.).unwrap();
    }
    writeln!(s).unwrap();

    let mut v = simulation.vcounters.counters.iter().collect::<Vec<_>>();
    v.sort_by(|x, y| x.0.cmp(y.0));
    for (label, vcounter) in v {
        if vcounter.values.is_empty() {
            continue;
        }
        writeln!(
            s,
            "{}: min:{} max:{} avg:{}",
            label,
            vcounter.min(),
            vcounter.max(),
            vcounter.avg()
        )
        .unwrap();
    }

    s
}
