use glam::Mat4;

use crate::base::SceneNode;

/// A spatial transform node, either a static matrix or a time function.
///
/// Time-varying transforms are registered with the pipeline's transform
/// table at build; the host re-evaluates them and rewrites the matrix
/// buffer wholesale before each frame, followed by an acceleration
/// structure refit.
pub trait Transform: SceneNode {
    /// True if `matrix` does not depend on time.
    fn is_static(&self) -> bool;

    /// True if the transform is statically the identity.
    fn is_identity(&self) -> bool {
        false
    }

    /// The transform matrix at `time`.
    fn matrix(&self, time: f32) -> Mat4;
}
