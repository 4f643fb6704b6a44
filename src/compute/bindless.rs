use std::sync::Arc;

use bytemuck::Pod;

use crate::compute::texture::{Tex2d, Tex3d};
use crate::errors::{PrismError, Result};

/// Fixed capacity of the bindless table.
pub const BINDLESS_CAPACITY: usize = 500_000;

enum Slot {
    Buffer(BufferStorage),
    Tex2d(Arc<Tex2d>),
    Tex3d(Arc<Tex3d>),
}

enum BufferStorage {
    Owned(Vec<u8>),
    ArenaView { block: u32, offset: u32, len: u32 },
}

/// The device-side flat array of heterogeneous resource handles.
///
/// IDs are handed out monotonically from a single counter shared by the
/// buffer, 2D-texture, and 3D-texture spaces, so the three spaces never
/// overlap and ids stay stable for the life of the pipeline. There is no
/// free list; the table is write-once during pipeline build and read-only
/// afterwards.
pub struct BindlessArray {
    slots: Vec<Slot>,
    blocks: Vec<Vec<u8>>,
}

impl BindlessArray {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            blocks: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn next_id(&self) -> Result<u32> {
        if self.slots.len() >= BINDLESS_CAPACITY {
            return Err(PrismError::ResourceExhausted(format!(
                "bindless table capacity ({BINDLESS_CAPACITY}) exceeded"
            )));
        }
        Ok(self.slots.len() as u32)
    }

    /// Uploads a typed buffer and returns its id.
    pub fn register_buffer<T: Pod>(&mut self, data: &[T]) -> Result<u32> {
        let id = self.next_id()?;
        self.slots
            .push(Slot::Buffer(BufferStorage::Owned(bytemuck::cast_slice(data).to_vec())));
        Ok(id)
    }

    /// Registers a 2D texture and returns its id.
    pub fn register_tex2d(&mut self, tex: Tex2d) -> Result<u32> {
        let id = self.next_id()?;
        self.slots.push(Slot::Tex2d(Arc::new(tex)));
        Ok(id)
    }

    /// Registers a 3D texture and returns its id.
    pub fn register_tex3d(&mut self, tex: Tex3d) -> Result<u32> {
        let id = self.next_id()?;
        self.slots.push(Slot::Tex3d(Arc::new(tex)));
        Ok(id)
    }

    /// Allocates a zeroed backing block for arena sub-allocations.
    pub(crate) fn create_block(&mut self, capacity: usize) -> u32 {
        let block = self.blocks.len() as u32;
        self.blocks.push(vec![0u8; capacity]);
        block
    }

    /// Registers a view into an arena block as a buffer slot.
    pub(crate) fn register_view(&mut self, block: u32, offset: usize, len: usize) -> Result<u32> {
        let id = self.next_id()?;
        self.slots.push(Slot::Buffer(BufferStorage::ArenaView {
            block,
            offset: offset as u32,
            len: len as u32,
        }));
        Ok(id)
    }

    /// Copies bytes into an arena block during pipeline build.
    pub(crate) fn write_block(&mut self, block: u32, offset: usize, bytes: &[u8]) {
        self.blocks[block as usize][offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Reads a typed view of a buffer slot.
    ///
    /// # Panics
    ///
    /// Panics if the id does not name a buffer slot; ids are computed at
    /// pipeline build and never escape it.
    #[must_use]
    pub fn buffer<T: Pod>(&self, id: u32) -> &[T] {
        match &self.slots[id as usize] {
            Slot::Buffer(BufferStorage::Owned(bytes)) => bytemuck::cast_slice(bytes),
            Slot::Buffer(BufferStorage::ArenaView { block, offset, len }) => {
                let bytes =
                    &self.blocks[*block as usize][*offset as usize..(*offset + *len) as usize];
                bytemuck::cast_slice(bytes)
            }
            _ => panic!("bindless id {id} is not a buffer"),
        }
    }

    /// Reads a 2D texture slot.
    #[must_use]
    pub fn tex2d(&self, id: u32) -> &Tex2d {
        match &self.slots[id as usize] {
            Slot::Tex2d(tex) => tex,
            _ => panic!("bindless id {id} is not a 2d texture"),
        }
    }

    /// Reads a 3D texture slot.
    #[must_use]
    pub fn tex3d(&self, id: u32) -> &Tex3d {
        match &self.slots[id as usize] {
            Slot::Tex3d(tex) => tex,
            _ => panic!("bindless id {id} is not a 3d texture"),
        }
    }

    /// Shares ownership of a 3D texture slot.
    #[must_use]
    pub fn tex3d_arc(&self, id: u32) -> Arc<Tex3d> {
        match &self.slots[id as usize] {
            Slot::Tex3d(tex) => tex.clone(),
            _ => panic!("bindless id {id} is not a 3d texture"),
        }
    }

    /// True if the id names a buffer slot.
    #[must_use]
    pub fn is_buffer(&self, id: u32) -> bool {
        matches!(self.slots.get(id as usize), Some(Slot::Buffer(_)))
    }

    /// True if the id names a 2D texture slot.
    #[must_use]
    pub fn is_tex2d(&self, id: u32) -> bool {
        matches!(self.slots.get(id as usize), Some(Slot::Tex2d(_)))
    }

    /// True if the id names a 3D texture slot.
    #[must_use]
    pub fn is_tex3d(&self, id: u32) -> bool {
        matches!(self.slots.get(id as usize), Some(Slot::Tex3d(_)))
    }
}

impl Default for BindlessArray {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotone_and_disjoint() {
        let mut array = BindlessArray::new();
        let b = array.register_buffer(&[1.0f32, 2.0]).unwrap();
        let t2 = array
            .register_tex2d(Tex2d::new(1, 1, vec![glam::Vec4::ONE]))
            .unwrap();
        let t3 = array
            .register_tex3d(Tex3d::new(glam::UVec3::ONE, vec![glam::Vec4::ONE]))
            .unwrap();
        assert_eq!((b, t2, t3), (0, 1, 2));
        assert!(array.is_buffer(b) && !array.is_tex2d(b));
        assert!(array.is_tex2d(t2) && !array.is_buffer(t2));
        assert!(array.is_tex3d(t3));
    }

    #[test]
    fn arena_views_read_back() {
        let mut array = BindlessArray::new();
        let block = array.create_block(64);
        let data = [1u32, 2, 3, 4];
        array.write_block(block, 16, bytemuck::cast_slice(&data));
        let id = array.register_view(block, 16, 16).unwrap();
        assert_eq!(array.buffer::<u32>(id), &data);
    }
}
