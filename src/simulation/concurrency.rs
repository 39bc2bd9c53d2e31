use rayon::prelude::*;

use std::sync::atomic::Ordering;

#[cfg(not(feature = "double-precision"))]
use std::sync::atomic::AtomicU32 as AtomicBits;
#[cfg(feature = "double-precision")]
use std::sync::atomic::AtomicU64 as AtomicBits;

use crate::{floating_type_mod::FT, V2};

pub fn into_par_iter<T: Send>(v: impl IntoParallelIterator<Item = T>) -> impl ParallelIterator<Item = T> {
    v.into_par_iter()
}

pub fn par_iter_mut0<F: Fn(usize) + Send + Sync>(n: usize, f: F) {
    (0..n).into_par_iter().for_each(|idx| {
        f(idx);
    });
}

pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
    arr1.into_par_iter().enumerate().for_each(|(idx, v1)| {
        f(idx, v1);
    });
}

pub fn par_iter_mut2<T1: Send + Sync, T2: Send + Sync, F: Fn(usize, &mut T1, &mut T2) + Send + Sync>(
    arr1: &mut [T1],
    arr2: &mut [T2],
    f: F,
) {
    arr1.into_par_iter()
        .zip(arr2.into_par_iter())
        .enumerate()
        .for_each(|(idx, (v1, v2))| {
            f(idx, v1, v2);
        });
}

pub fn par_iter_mut3<
    T1: Send + Sync,
    T2: Send + Sync,
    T3: Send + Sync,
    F: Fn(usize, &mut T1, &mut T2, &mut T3) + Send + Sync,
>(
    arr1: &mut [T1],
    arr2: &mut [T2],
    arr3: &mut [T3],
    f: F,
) {
    arr1.into_par_iter()
        .zip(arr2.into_par_iter())
        .zip(arr3.into_par_iter())
        .enumerate()
        .for_each(|(idx, ((v1, v2), v3))| {
            f(idx, v1, v2, v3);
        });
}

/// Splits both slices into chunks of `chunk_size` and processes chunk pairs in parallel.
/// The closure gets the chunk index.
pub fn par_chunks_mut2<T1: Send + Sync, T2: Send + Sync, F: Fn(usize, &mut [T1], &mut [T2]) + Send + Sync>(
    arr1: &mut [T1],
    arr2: &mut [T2],
    chunk_size: usize,
    f: F,
) {
    arr1.par_chunks_mut(chunk_size)
        .zip(arr2.par_chunks_mut(chunk_size))
        .enumerate()
        .for_each(|(idx, (c1, c2))| {
            f(idx, c1, c2);
        });
}

/// Float with an atomic `fetch_add` (compare-and-swap on the bit pattern).
///
/// All accesses are relaxed. Values written in one parallel pass are only read
/// after the pass has been joined.
#[derive(Debug)]
pub struct AtomicFT {
    bits: AtomicBits,
}

impl AtomicFT {
    pub fn new(v: FT) -> Self {
        AtomicFT {
            bits: AtomicBits::new(v.to_bits()),
        }
    }

    pub fn load(&self) -> FT {
        FT::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&mut self, v: FT) {
        *self.bits.get_mut() = v.to_bits();
    }

    /// Returns the previous value.
    pub fn fetch_add(&self, v: FT) -> FT {
        let previous = self
            .bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((FT::from_bits(bits) + v).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        FT::from_bits(previous)
    }
}

impl Default for AtomicFT {
    fn default() -> Self {
        AtomicFT::new(0.)
    }
}

/// 2D vector of `AtomicFT`. The components are updated independently.
#[derive(Debug, Default)]
pub struct AtomicV2 {
    x: AtomicFT,
    y: AtomicFT,
}

impl AtomicV2 {
    pub fn new(v: V2) -> Self {
        AtomicV2 {
            x: AtomicFT::new(v.x),
            y: AtomicFT::new(v.y),
        }
    }

    pub fn load(&self) -> V2 {
        V2::new(self.x.load(), self.y.load())
    }

    pub fn set(&mut self, v: V2) {
        self.x.set(v.x);
        self.y.set(v.y);
    }

    pub fn add(&self, v: V2) {
        self.x.fetch_add(v.x);
        self.y.fetch_add(v.y);
    }

    pub fn sub(&self, v: V2) {
        self.add(-v);
    }
}

#[cfg(test)]
mod tests {
    use super::{par_iter_mut0, AtomicFT, AtomicV2};
    use crate::{floating_type_mod::FT, vec2f};

    #[test]
    fn concurrent_fetch_add_loses_no_updates() {
        let acc = AtomicFT::new(0.);
        par_iter_mut0(10000, |_| {
            acc.fetch_add(0.5);
        });
        // every partial sum is a multiple of 0.5 below 2^24, so the result is exact
        assert_eq!(acc.load(), 5000.);
    }

    #[test]
    fn atomic_vector_add_and_sub() {
        let mut v = AtomicV2::new(vec2f(1., -2.));
        v.add(vec2f(0.5, 0.5));
        v.sub(vec2f(1., 1.));
        assert_eq!(v.load(), vec2f(0.5, -2.5));
        v.set(vec2f(0., 3.));
        assert_eq!(v.load(), vec2f(0., 3.));

        let previous = AtomicFT::new(2.).fetch_add(1.);
        assert_eq!(previous, 2. as FT);
    }
}
