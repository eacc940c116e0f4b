//! Core types used throughout the Lancer asset pipeline

use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
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
    /// Create a new transform at the given position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a new transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// Create a transform from an origin and a row-major 3x3 rotation, the
    /// layout joint and hardpoint records store on disk.
    pub fn from_origin_rows(origin: Vec3, rows: [f32; 9]) -> Self {
        let rotation = Mat3::from_cols_array(&rows).transpose();
        Self::from_position_rotation(origin, Quat::from_mat3(&rotation).normalize())
    }

    /// Compute the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// RGBA color with floating point components (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    /// Magenta, drawn in place of a material that could not be resolved.
    pub const PLACEHOLDER: Color = Color::rgb(1.0, 0.0, 1.0);

    /// Create a color from RGB values (alpha = 1.0)
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from RGBA values
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from three or four components. Returns `None` for any
    /// other length.
    pub fn from_components(values: &[f32]) -> Option<Self> {
        match *values {
            [r, g, b] => Some(Self::rgb(r, g, b)),
            [r, g, b, a, ..] => Some(Self::rgba(r, g, b, a)),
            _ => None,
        }
    }

    /// Create a color from a packed 0xAARRGGBB value
    pub fn from_argb(packed: u32) -> Self {
        let a = ((packed >> 24) & 0xFF) as f32 / 255.0;
        let r = ((packed >> 16) & 0xFF) as f32 / 255.0;
        let g = ((packed >> 8) & 0xFF) as f32 / 255.0;
        let b = (packed & 0xFF) as f32 / 255.0;
        Self::rgba(r, g, b, a)
    }

    /// Convert to an array [r, g, b, a]
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_matrix_translates() {
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let p = t.matrix().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn identity_rows_give_identity_rotation() {
        let rows = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let t = Transform::from_origin_rows(Vec3::X, rows);
        assert!(t.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
        assert_eq!(t.position, Vec3::X);
    }

    #[test]
    fn rows_are_row_major() {
        let quarter_turn_z = [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let t = Transform::from_origin_rows(Vec3::ZERO, quarter_turn_z);
        let v = t.matrix().transform_vector3(Vec3::X);
        assert!(v.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn color_from_components() {
        assert_eq!(
            Color::from_components(&[0.5, 0.25, 1.0]),
            Some(Color::rgb(0.5, 0.25, 1.0))
        );
        assert_eq!(
            Color::from_components(&[0.5, 0.25, 1.0, 0.1]),
            Some(Color::rgba(0.5, 0.25, 1.0, 0.1))
        );
        assert_eq!(Color::from_components(&[0.5]), None);
    }

    #[test]
    fn color_from_argb() {
        let c = Color::from_argb(0xFF00_FF00);
        assert_eq!(c, Color::rgba(0.0, 1.0, 0.0, 1.0));
    }
}
