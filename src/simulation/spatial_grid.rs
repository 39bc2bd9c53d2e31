//! Uniform grid over the unit square, rebuilt from scratch every substep with a
//! parallel counting sort.
//!
//! Cells are stored column by column: the cell `(x, y)` has the linear index
//! `x * grid_n + y`, so every column is a contiguous block of `grid_n` cells.
//! After [`SpatialGrid::rebuild`] the particle indices of every cell form a
//! contiguous range `[head, tail)` of one shared permutation array.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{
    concurrency::{par_chunks_mut2, par_iter_mut0, par_iter_mut1},
    floating_type_mod::FT,
    thread_safe_ptr::ThreadSafeMutPtr,
    V2, V2I,
};

/// Cell coordinates of a position, clamped into the grid.
pub fn cell_of(position: V2, grid_n: usize) -> V2I {
    let max_cell = grid_n as i32 - 1;
    position.map(|x| ((x * grid_n as FT).floor() as i32).clamp(0, max_cell))
}

#[inline(always)]
fn linear_index(cell: V2I, grid_n: usize) -> usize {
    cell.x as usize * grid_n + cell.y as usize
}

/// Working memory of the counting sort. Nothing in here is meaningful across
/// two rebuilds.
pub struct SpatialGrid {
    grid_n: usize,

    // per cell
    cell_count: Vec<AtomicU32>,
    cursor: Vec<AtomicU32>,
    head: Vec<u32>,
    tail: Vec<u32>,

    // per column
    column_sum: Vec<u32>,
    column_offset: Vec<u32>,

    // per particle
    particle_cell: Vec<u32>,
    permutation: Vec<u32>,
}

impl SpatialGrid {
    pub fn new(grid_n: usize) -> Self {
        assert!(grid_n > 0);
        let num_cells = grid_n * grid_n;
        SpatialGrid {
            grid_n,
            cell_count: (0..num_cells).map(|_| AtomicU32::new(0)).collect(),
            cursor: (0..num_cells).map(|_| AtomicU32::new(0)).collect(),
            head: vec![0; num_cells],
            tail: vec![0; num_cells],
            column_sum: vec![0; grid_n],
            column_offset: vec![0; grid_n],
            particle_cell: Vec::new(),
            permutation: Vec::new(),
        }
    }

    pub fn grid_n(&self) -> usize {
        self.grid_n
    }

    pub fn cell_size(&self) -> FT {
        1. / self.grid_n as FT
    }

    pub fn num_cells(&self) -> usize {
        self.grid_n * self.grid_n
    }

    pub fn cell_of(&self, position: V2) -> V2I {
        cell_of(position, self.grid_n)
    }

    pub fn rebuild(&mut self, positions: &[V2]) {
        let n = positions.len();
        let grid_n = self.grid_n;
        assert!(n <= u32::MAX as usize, "too many particles for 32 bit indices");

        self.particle_cell.resize(n, 0);
        self.permutation.resize(n, 0);

        // 1. count particles per cell
        par_iter_mut1(&mut self.cell_count, |_, count| {
            *count.get_mut() = 0;
        });
        {
            let cell_count = &self.cell_count;
            par_iter_mut1(&mut self.particle_cell, |i, p_cell| {
                let cell = linear_index(cell_of(positions[i], grid_n), grid_n);
                *p_cell = cell as u32;
                cell_count[cell].fetch_add(1, Ordering::Relaxed);
            });
        }

        // 2. column sums in parallel, then a short serial scan over the columns
        {
            let cell_count = &self.cell_count;
            par_iter_mut1(&mut self.column_sum, |x, sum| {
                *sum = cell_count[x * grid_n..(x + 1) * grid_n]
                    .iter()
                    .map(|c| c.load(Ordering::Relaxed))
                    .sum();
            });
        }

        let mut running_sum = 0;
        for x in 0..grid_n {
            self.column_offset[x] = running_sum;
            running_sum += self.column_sum[x];
        }
        debug_assert_eq!(running_sum as usize, n);

        // 3. finish the exclusive prefix sum inside every column in parallel
        {
            let cell_count = &self.cell_count;
            let column_offset = &self.column_offset;
            let cursor = &self.cursor;
            par_chunks_mut2(&mut self.head, &mut self.tail, grid_n, |x, column_head, column_tail| {
                let mut offset = column_offset[x];
                for y in 0..grid_n {
                    let cell = x * grid_n + y;
                    column_head[y] = offset;
                    offset += cell_count[cell].load(Ordering::Relaxed);
                    column_tail[y] = offset;
                    cursor[cell].store(column_head[y], Ordering::Relaxed);
                }
            });
        }

        // 4. scatter: every particle claims the next free slot of its cell
        {
            let cursor = &self.cursor;
            let particle_cell = &self.particle_cell;
            let permutation = ThreadSafeMutPtr::new(&mut self.permutation);
            par_iter_mut0(n, |i| {
                let slot = cursor[particle_cell[i] as usize].fetch_add(1, Ordering::Relaxed);
                // SAFETY: the slot was claimed atomically and lies inside the
                // cell's range, so no other worker writes it.
                unsafe {
                    permutation.write(slot as usize, i as u32);
                }
            });
        }
    }

    /// Particle indices in the cell with the given linear index.
    pub fn cell_range(&self, cell: usize) -> &[u32] {
        &self.permutation[self.head[cell] as usize..self.tail[cell] as usize]
    }

    /// Particle indices in cell `(x, y)`. Both coordinates have to be inside the grid.
    pub fn cell_particles(&self, cell: V2I) -> impl Iterator<Item = usize> + '_ {
        self.cell_range(linear_index(cell, self.grid_n))
            .iter()
            .map(|&j| j as usize)
    }

    /// Slow check of the partition invariants: ranges are disjoint, cover every
    /// particle exactly once and each particle sits in the cell of its position.
    pub fn assert_partition(&self, positions: &[V2]) {
        let n = positions.len();
        assert_eq!(self.permutation.len(), n, "permutation has wrong length");

        let mut seen = vec![false; n];
        let mut covered = 0;
        let mut expected_head = 0;

        for x in 0..self.grid_n {
            for y in 0..self.grid_n {
                let cell = x * self.grid_n + y;
                let (head, tail) = (self.head[cell], self.tail[cell]);
                assert_eq!(head, expected_head, "cell ({}, {}) does not start where the previous ended", x, y);
                assert!(head <= tail);
                expected_head = tail;

                for &j in self.cell_range(cell) {
                    let j = j as usize;
                    assert!(j < n, "invalid particle index {} in cell ({}, {})", j, x, y);
                    assert!(!seen[j], "particle {} is stored twice", j);
                    seen[j] = true;
                    covered += 1;

                    let home = self.cell_of(positions[j]);
                    assert_eq!(
                        (home.x as usize, home.y as usize),
                        (x, y),
                        "particle {} stored in the wrong cell",
                        j
                    );
                }
            }
        }

        assert_eq!(covered, n, "not all particles were sorted into the grid");
        assert_eq!(expected_head as usize, n);
    }
}
