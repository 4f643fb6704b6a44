//! The compute capability assumed by the render core.
//!
//! This module realizes, on the CPU, the contract the pipeline depends
//! on: frozen device buffers with typed views, 2D/3D textures, a bindless
//! resource table, a two-level acceleration structure with closest-hit
//! and any-hit ray queries, massively parallel 2D kernel dispatch, and
//! atomic float adds. Kernels are closed over their resources once at
//! pipeline build; per-frame dispatches allocate nothing.

mod accel;
mod bindless;
mod dispatch;
mod ray;
mod texture;

pub use accel::{Accel, Blas, TlasInstance, Triangle, Vertex};
pub use bindless::{BindlessArray, BINDLESS_CAPACITY};
pub use dispatch::{atomic_add_f32, dispatch_2d, BLOCK_SIZE};
pub use ray::{Hit, Ray};
pub use texture::{Tex2d, Tex3d};
