use std::sync::atomic::{AtomicU32, Ordering};

use glam::UVec2;
use rayon::prelude::*;

/// Kernel block edge length; 2D dispatches decompose into 16x16 tiles.
pub const BLOCK_SIZE: u32 = 16;

/// Launches a 2D kernel over `resolution`, one invocation per texel,
/// decomposed into [`BLOCK_SIZE`]-square tiles scheduled on the global
/// thread pool. The kernel body must only share state through atomics.
pub fn dispatch_2d<F>(resolution: UVec2, kernel: F)
where
    F: Fn(UVec2) + Sync,
{
    let blocks_x = resolution.x.div_ceil(BLOCK_SIZE);
    let blocks_y = resolution.y.div_ceil(BLOCK_SIZE);
    (0..blocks_x * blocks_y).into_par_iter().for_each(|block| {
        let bx = (block % blocks_x) * BLOCK_SIZE;
        let by = (block / blocks_x) * BLOCK_SIZE;
        for ly in 0..BLOCK_SIZE {
            let y = by + ly;
            if y >= resolution.y {
                break;
            }
            for lx in 0..BLOCK_SIZE {
                let x = bx + lx;
                if x >= resolution.x {
                    break;
                }
                kernel(UVec2::new(x, y));
            }
        }
    });
}

/// Atomic `f32` add on a bit-cast `u32` slot.
pub fn atomic_add_f32(slot: &AtomicU32, value: f32) {
    let mut current = slot.load(Ordering::Relaxed);
    loop {
        let updated = (f32::from_bits(current) + value).to_bits();
        match slot.compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_every_texel_once() {
        let resolution = UVec2::new(37, 21);
        let counters: Vec<AtomicU32> = (0..resolution.x * resolution.y)
            .map(|_| AtomicU32::new(0))
            .collect();
        dispatch_2d(resolution, |p| {
            counters[(p.y * resolution.x + p.x) as usize].fetch_add(1, Ordering::Relaxed);
        });
        assert!(counters
            .iter()
            .all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn atomic_float_add_accumulates() {
        let slot = AtomicU32::new(0.0f32.to_bits());
        (0..1000).into_par_iter().for_each(|_| {
            atomic_add_f32(&slot, 0.5);
        });
        let total = f32::from_bits(slot.load(Ordering::Relaxed));
        assert!((total - 500.0).abs() < 1e-3);
    }
}
