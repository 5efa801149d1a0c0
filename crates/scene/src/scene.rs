//! The rendered scene: a camera, one shared mesh and a set of animated
//! model instances.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use frameloop_core::{Error, Result};

use crate::camera::Camera;
use crate::mesh::Mesh;
use crate::transform::{Fixed, ModelTransform, Orbit, Spin, Transform};

/// Model matrices carried per uniform buffer. Must match the shader.
pub const MAX_MODELS: usize = 8;

/// Per-target uniform block.
///
/// Layout is std140-compatible: every member is a column-major `mat4`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view: Mat4,
    pub proj: Mat4,
    pub models: [Mat4; MAX_MODELS],
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            models: [Mat4::IDENTITY; MAX_MODELS],
        }
    }
}

impl SceneUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

pub struct Scene {
    pub camera: Camera,
    mesh: Mesh,
    models: Vec<Box<dyn ModelTransform>>,
}

impl Scene {
    pub fn new(camera: Camera, mesh: Mesh) -> Self {
        Self {
            camera,
            mesh,
            models: Vec::new(),
        }
    }

    /// Adds a model instance drawn with the scene mesh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] once [`MAX_MODELS`] instances exist.
    pub fn add_model(&mut self, model: impl ModelTransform + 'static) -> Result<usize> {
        if self.models.len() >= MAX_MODELS {
            return Err(Error::Config(format!(
                "scene holds at most {} models",
                MAX_MODELS
            )));
        }
        self.models.push(Box::new(model));
        Ok(self.models.len() - 1)
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Uniform block for `time` seconds since startup.
    ///
    /// Unused model slots stay at identity.
    pub fn uniforms(&self, time: f32, aspect: f32) -> SceneUniforms {
        let mut uniforms = SceneUniforms {
            view: self.camera.view_matrix(),
            proj: self.camera.projection_matrix(aspect),
            ..Default::default()
        };
        for (slot, model) in uniforms.models.iter_mut().zip(&self.models) {
            *slot = model.compute_transform(time);
        }
        uniforms
    }

    /// Three cubes: one standing up and spinning, one fixed, one orbiting.
    pub fn demo() -> Self {
        let mut scene = Self::new(Camera::default(), Mesh::cube(1.0));
        let upright = Transform::new()
            .with_rotation(Quat::from_rotation_x(90f32.to_radians()))
            .with_scale(Vec3::splat(10.0));

        let models: [Box<dyn ModelTransform>; 3] = [
            Box::new(Spin::new(upright, Vec3::Y, 20.0)),
            Box::new(Fixed(
                Transform::new()
                    .with_position(Vec3::new(0.0, 20.0, 0.0))
                    .with_scale(Vec3::splat(4.0)),
            )),
            Box::new(
                Orbit::new(Vec3::ZERO, Vec3::Z, 18.0, 45.0).with_scale(Vec3::splat(3.0)),
            ),
        ];
        scene.models.extend(models);

        tracing::debug!("Demo scene with {} models", scene.models.len());
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size_matches_shader_block() {
        assert_eq!(SceneUniforms::SIZE, (2 + MAX_MODELS as u64) * 64);
    }

    #[test]
    fn test_add_model_limit() {
        let mut scene = Scene::new(Camera::default(), Mesh::cube(1.0));
        for i in 0..MAX_MODELS {
            assert_eq!(scene.add_model(Fixed(Transform::new())).unwrap(), i);
        }
        assert!(matches!(
            scene.add_model(Fixed(Transform::new())),
            Err(Error::Config(_))
        ));
        assert_eq!(scene.model_count(), MAX_MODELS);
    }

    #[test]
    fn test_uniforms_fill_used_slots_only() {
        let mut scene = Scene::new(Camera::default(), Mesh::cube(1.0));
        let offset = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        scene.add_model(move |_time: f32| offset).unwrap();

        let uniforms = scene.uniforms(0.0, 1.0);
        assert_eq!(uniforms.models[0], offset);
        assert!(uniforms.models[1..].iter().all(|m| *m == Mat4::IDENTITY));
        assert_eq!(uniforms.view, scene.camera.view_matrix());
    }

    #[test]
    fn test_uniforms_follow_aspect() {
        let scene = Scene::demo();
        let square = scene.uniforms(0.0, 1.0);
        let wide = scene.uniforms(0.0, 2.0);
        assert_ne!(square.proj, wide.proj);
        assert_eq!(square.view, wide.view);
    }

    #[test]
    fn test_demo_animates() {
        let scene = Scene::demo();
        assert_eq!(scene.model_count(), 3);
        let early = scene.uniforms(0.0, 1.0);
        let later = scene.uniforms(1.0, 1.0);
        assert_ne!(early.models[0], later.models[0]);
        assert_eq!(early.models[1], later.models[1]);
        assert_ne!(early.models[2], later.models[2]);
    }
}
