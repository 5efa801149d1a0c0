//! Scene content for frameloop.
//!
//! This crate provides what gets drawn:
//! - Model transforms, static or animated over time
//! - A fixed look-at camera
//! - The built-in cube mesh
//! - The [`Scene`] that turns all of it into per-frame uniforms

pub mod camera;
pub mod mesh;
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use mesh::Mesh;
pub use scene::{MAX_MODELS, Scene, SceneUniforms};
pub use transform::{Fixed, ModelTransform, Orbit, Spin, Transform};
