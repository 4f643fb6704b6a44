use bytemuck::Pod;

use crate::compute::BindlessArray;
use crate::errors::Result;

/// Size of one preallocated arena block.
pub const ARENA_BLOCK_SIZE: usize = 64 << 20;
/// Requests at or above this size bypass the arena and get a dedicated
/// buffer.
pub const ARENA_ALLOCATION_THRESHOLD: usize = 4 << 20;

const ARENA_ALIGNMENT: usize = 16;

/// Sub-allocates small typed buffers from large preallocated device
/// blocks. Exhausting a block falls back to a fresh one; oversized
/// requests get dedicated buffers. Every allocation still receives its
/// own bindless slot, so consumers address arena views and dedicated
/// buffers uniformly.
pub struct BufferArena {
    block: Option<u32>,
    offset: usize,
}

impl BufferArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            block: None,
            offset: 0,
        }
    }

    /// Uploads `data` and returns its bindless buffer id.
    pub fn allocate<T: Pod>(&mut self, bindless: &mut BindlessArray, data: &[T]) -> Result<u32> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() >= ARENA_ALLOCATION_THRESHOLD {
            return bindless.register_buffer(data);
        }
        let block = match self.block {
            Some(block) if self.offset + bytes.len() <= ARENA_BLOCK_SIZE => block,
            _ => {
                let block = bindless.create_block(ARENA_BLOCK_SIZE);
                self.block = Some(block);
                self.offset = 0;
                block
            }
        };
        let offset = self.offset;
        bindless.write_block(block, offset, bytes);
        self.offset = (offset + bytes.len() + ARENA_ALIGNMENT - 1) & !(ARENA_ALIGNMENT - 1);
        bindless.register_view(block, offset, bytes.len())
    }
}

impl Default for BufferArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_allocations_get_consecutive_ids() {
        let mut bindless = BindlessArray::new();
        let mut arena = BufferArena::new();
        let a = arena.allocate(&mut bindless, &[1u32, 2, 3]).unwrap();
        let b = arena.allocate(&mut bindless, &[4.0f32, 5.0]).unwrap();
        assert_eq!(b, a + 1);
        assert_eq!(bindless.buffer::<u32>(a), &[1, 2, 3]);
        assert_eq!(bindless.buffer::<f32>(b), &[4.0, 5.0]);
    }
}
