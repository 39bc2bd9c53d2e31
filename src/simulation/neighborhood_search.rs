//! Broad phase: candidate enumeration on the [`SpatialGrid`] and the rule that
//! decides which side of a candidate pair resolves the contact.

use crate::{
    floating_type_mod::FT,
    particles::{ParticleClass, ParticleVec},
    spatial_grid::SpatialGrid,
    V2,
};

/// Half-width (in cells) of the window a Large particle has to search so that
/// every particle within `2 * large_radius` is found.
pub fn large_search_half_width(large_radius: FT, cell_size: FT) -> i32 {
    (2. * large_radius / cell_size).ceil() as i32 + 1
}

/// Decides whether particle `i` resolves its contact with candidate `j`.
///
/// Small-Small and Large-Large pairs see each other through windows of the same
/// size, so the lower index resolves. A Large-Small pair can only be found from
/// the Large side because the 3x3 window of a Small particle does not reach far
/// enough, so the Large particle resolves it without an ordering check.
///
/// This only holds as long as the Small window is narrower than the Large one.
/// Searching a wider window for Small particles would count Large-Small
/// contacts twice.
#[inline(always)]
pub fn should_resolve(i: usize, class_i: ParticleClass, j: usize, class_j: ParticleClass) -> bool {
    match (class_i, class_j) {
        (ParticleClass::Small, ParticleClass::Small) => i < j,
        (ParticleClass::Large, ParticleClass::Large) => i < j,
        (ParticleClass::Large, ParticleClass::Small) => true,
        (ParticleClass::Small, ParticleClass::Large) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborQuery {
    large_half_width: i32,
}

impl NeighborQuery {
    pub fn new(large_half_width: i32) -> Self {
        assert!(large_half_width >= 1);
        NeighborQuery { large_half_width }
    }

    /// Sizes the Large window from the widest Large particle in the store. Without
    /// Large particles the Large window is never used.
    pub fn for_particles(particles: &ParticleVec, cell_size: FT) -> Self {
        let large_half_width = particles
            .max_radius(ParticleClass::Large)
            .map_or(1, |r| large_search_half_width(r, cell_size).max(1));
        NeighborQuery::new(large_half_width)
    }

    pub fn search_half_width(&self, class: ParticleClass) -> i32 {
        match class {
            ParticleClass::Small => 1,
            ParticleClass::Large => self.large_half_width,
        }
    }

    /// Calls `f` for every particle stored in the search window of a particle at
    /// `position`. This includes the particle itself.
    pub fn for_each_candidate(&self, grid: &SpatialGrid, position: V2, class: ParticleClass, mut f: impl FnMut(usize)) {
        let w = self.search_half_width(class);
        let home = grid.cell_of(position);
        let max_cell = grid.grid_n() as i32 - 1;

        let x_begin = (home.x - w).max(0);
        let x_end = (home.x + w).min(max_cell);
        let y_begin = (home.y - w).max(0);
        let y_end = (home.y + w).min(max_cell);

        for x in x_begin..=x_end {
            for y in y_begin..=y_end {
                for j in grid.cell_particles([x, y].into()) {
                    f(j);
                }
            }
        }
    }

    /// Calls `f(j)` for every candidate `j` that particle `i` is responsible for.
    pub fn for_each_resolved_pair(
        &self,
        grid: &SpatialGrid,
        particles: &ParticleVec,
        i: usize,
        mut f: impl FnMut(usize),
    ) {
        let class_i = particles.class[i];
        self.for_each_candidate(grid, particles.position[i], class_i, |j| {
            if should_resolve(i, class_i, j, particles.class[j]) {
                f(j);
            }
        });
    }
}
