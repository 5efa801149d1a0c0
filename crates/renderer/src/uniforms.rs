//! Per-frame uniform data.

use std::time::Duration;

use frameloop_core::SurfaceExtent;
use frameloop_scene::{Scene, SceneUniforms};

use crate::targets::TargetHandle;

/// What the uniform updater knows about the frame being built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    pub target: TargetHandle,
    /// Time since the renderer started.
    pub elapsed: Duration,
    pub extent: SurfaceExtent,
    pub frame_number: u64,
}

/// Produces the bytes written into the acquired target's uniform buffer.
pub trait UniformUpdater {
    /// Size in bytes of every uniform block this updater produces.
    fn uniform_size(&self) -> u64;

    fn uniform_bytes(&mut self, ctx: &FrameContext) -> Vec<u8>;
}

impl UniformUpdater for Scene {
    fn uniform_size(&self) -> u64 {
        SceneUniforms::SIZE
    }

    fn uniform_bytes(&mut self, ctx: &FrameContext) -> Vec<u8> {
        let uniforms = self.uniforms(ctx.elapsed.as_secs_f32(), ctx.extent.aspect_ratio());
        bytemuck::bytes_of(&uniforms).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_bytes_match_declared_size() {
        let mut scene = Scene::demo();
        let ctx = FrameContext {
            target: TargetHandle::new(0, 1),
            elapsed: Duration::from_millis(1500),
            extent: SurfaceExtent::new(800, 600),
            frame_number: 10,
        };
        let bytes = scene.uniform_bytes(&ctx);
        assert_eq!(bytes.len() as u64, scene.uniform_size());
    }

    #[test]
    fn test_scene_bytes_depend_on_time() {
        let mut scene = Scene::demo();
        let mut ctx = FrameContext {
            target: TargetHandle::new(0, 1),
            elapsed: Duration::ZERO,
            extent: SurfaceExtent::new(800, 600),
            frame_number: 0,
        };
        let first = scene.uniform_bytes(&ctx);
        ctx.elapsed = Duration::from_secs(2);
        let second = scene.uniform_bytes(&ctx);
        assert_ne!(first, second);
    }
}
