//! Model transforms.
//!
//! A [`Transform`] is a static position/rotation/scale. A [`ModelTransform`]
//! produces a model matrix for a point in time, which is how each model in a
//! scene gets animated:
//!
//! ```
//! use frameloop_scene::{ModelTransform, Spin, Transform};
//! use glam::Vec3;
//!
//! let spin = Spin::new(Transform::new(), Vec3::Y, 90.0);
//! let at_one_second = spin.compute_transform(1.0);
//! let p = at_one_second.transform_point3(Vec3::X);
//! assert!(p.abs_diff_eq(Vec3::NEG_Z, 1e-5));
//! ```

use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale of a model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Translation * rotation * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Computes a model matrix from the time in seconds since startup.
pub trait ModelTransform: Send {
    fn compute_transform(&self, time: f32) -> Mat4;
}

/// Any `Fn(f32) -> Mat4` closure is a model transform.
impl<F> ModelTransform for F
where
    F: Fn(f32) -> Mat4 + Send,
{
    fn compute_transform(&self, time: f32) -> Mat4 {
        self(time)
    }
}

/// A model that never moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fixed(pub Transform);

impl ModelTransform for Fixed {
    fn compute_transform(&self, _time: f32) -> Mat4 {
        self.0.matrix()
    }
}

/// Rotates about a model-space axis at a constant rate.
///
/// The spin is applied after the base rotation and before the base scale,
/// so a model first oriented upright keeps spinning about its own axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spin {
    pub base: Transform,
    pub axis: Vec3,
    pub degrees_per_second: f32,
}

impl Spin {
    pub fn new(base: Transform, axis: Vec3, degrees_per_second: f32) -> Self {
        Self {
            base,
            axis: axis.normalize_or(Vec3::Y),
            degrees_per_second,
        }
    }
}

impl ModelTransform for Spin {
    fn compute_transform(&self, time: f32) -> Mat4 {
        let angle = (time * self.degrees_per_second).to_radians();
        let rotation = self.base.rotation * Quat::from_axis_angle(self.axis, angle);
        Mat4::from_scale_rotation_translation(self.base.scale, rotation, self.base.position)
    }
}

/// Circles around `center` in the plane perpendicular to `axis`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orbit {
    pub center: Vec3,
    pub axis: Vec3,
    pub radius: f32,
    pub degrees_per_second: f32,
    pub scale: Vec3,
}

impl Orbit {
    pub fn new(center: Vec3, axis: Vec3, radius: f32, degrees_per_second: f32) -> Self {
        Self {
            center,
            axis: axis.normalize_or(Vec3::Z),
            radius,
            degrees_per_second,
            scale: Vec3::ONE,
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }
}

impl ModelTransform for Orbit {
    fn compute_transform(&self, time: f32) -> Mat4 {
        let angle = (time * self.degrees_per_second).to_radians();
        let rotation = Quat::from_axis_angle(self.axis, angle);
        let offset = rotation * (self.axis.any_orthonormal_vector() * self.radius);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.center + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_default_is_identity() {
        assert_eq!(Transform::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_transform_builder() {
        let t = Transform::new()
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::splat(2.0));
        let p = t.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), EPSILON));
    }

    #[test]
    fn test_fixed_ignores_time() {
        let fixed = Fixed(Transform::new().with_position(Vec3::new(0.0, 50.0, 3.0)));
        assert_eq!(fixed.compute_transform(0.0), fixed.compute_transform(42.0));
    }

    #[test]
    fn test_spin_rate() {
        let spin = Spin::new(Transform::new(), Vec3::Z, 20.0);
        // 4.5 s at 20°/s is a quarter turn.
        let p = spin.compute_transform(4.5).transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::Y, EPSILON), "got {:?}", p);
    }

    #[test]
    fn test_spin_applies_after_base_rotation() {
        // Stand the model up (X by 90°) then spin it about its own Y axis.
        let base = Transform::new().with_rotation(Quat::from_rotation_x(90f32.to_radians()));
        let spin = Spin::new(base, Vec3::Y, 90.0);

        // Model-space Y maps to world Z under the base rotation and is the
        // spin axis, so it must stay fixed.
        let up = spin.compute_transform(1.0).transform_vector3(Vec3::Y);
        assert!(up.abs_diff_eq(Vec3::Z, EPSILON), "got {:?}", up);
    }

    #[test]
    fn test_spin_keeps_scale() {
        let base = Transform::new().with_scale(Vec3::splat(20.0));
        let spin = Spin::new(base, Vec3::Y, 45.0);
        let v = spin.compute_transform(3.0).transform_vector3(Vec3::Y);
        assert_relative_eq!(v.length(), 20.0, epsilon = 1e-3);
    }

    #[test]
    fn test_orbit_stays_on_circle() {
        let orbit = Orbit::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Z, 5.0, 30.0);
        for step in 0..12 {
            let time = step as f32 * 0.7;
            let position = orbit.compute_transform(time).transform_point3(Vec3::ZERO);
            let offset = position - orbit.center;
            assert_relative_eq!(offset.length(), 5.0, epsilon = 1e-4);
            assert_relative_eq!(offset.dot(Vec3::Z), 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_closure_is_model_transform() {
        let bob = |time: f32| Mat4::from_translation(Vec3::new(0.0, 0.0, time.sin()));
        let boxed: Box<dyn ModelTransform> = Box::new(bob);
        assert_eq!(boxed.compute_transform(0.0), Mat4::IDENTITY);
    }
}
