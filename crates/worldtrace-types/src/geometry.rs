//! Spatial value types: vectors, rotations, poses, and bounding boxes.
//!
//! These mirror the single-precision math types the world protocol uses.
//! They are plain `Copy` values; nothing here is shared or versioned.

use serde::{Deserialize, Serialize};

/// Length below which a vector is treated as zero when normalizing.
const NORMALIZE_EPSILON: f32 = 1.0e-6;

/// Three-component single-precision vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vector3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Unit vector along X.
    pub const UNIT_X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit vector along Z (the world's vertical axis).
    pub const UNIT_Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Construct a vector from its components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Dot product.
    pub fn dot(self, other: Self) -> f32 {
        self.z.mul_add(other.z, self.x.mul_add(other.x, self.y * other.y))
    }

    /// Cross product.
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y.mul_add(other.z, -(self.z * other.y)),
            self.z.mul_add(other.x, -(self.x * other.z)),
            self.x.mul_add(other.y, -(self.y * other.x)),
        )
    }

    /// Unit-length copy of this vector, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len < NORMALIZE_EPSILON || !len.is_finite() {
            return None;
        }
        Some(Self::new(self.x / len, self.y / len, self.z / len))
    }

    /// Component-wise minimum.
    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Component-wise maximum.
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }
}

/// Unit quaternion rotation, stored in the protocol's `x, y, z, w` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// W (scalar) component.
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Construct a quaternion from raw components.
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about `axis`.
    ///
    /// A degenerate axis yields the identity.
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        let Some(axis) = axis.normalized() else {
            return Self::IDENTITY;
        };
        let (sin, cos) = (angle * 0.5).sin_cos();
        Self::new(axis.x * sin, axis.y * sin, axis.z * sin, cos)
    }

    /// Shortest-arc rotation taking direction `from` onto direction `to`.
    ///
    /// Returns the identity when either input is degenerate. Opposite
    /// directions rotate half a turn about the vertical axis.
    pub fn rotation_between(from: Vector3, to: Vector3) -> Self {
        let (Some(from), Some(to)) = (from.normalized(), to.normalized()) else {
            return Self::IDENTITY;
        };
        let dot = from.dot(to);
        if dot <= -1.0 + NORMALIZE_EPSILON {
            return Self::from_axis_angle(Vector3::UNIT_Z, core::f32::consts::PI);
        }
        let axis = from.cross(to);
        let w = 1.0 + dot;
        let norm = w.mul_add(w, axis.dot(axis)).sqrt();
        Self::new(axis.x / norm, axis.y / norm, axis.z / norm, w / norm)
    }
}

/// Last known kinematic state of a remote object.
///
/// Overwritten on every motion update; never versioned.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Region-relative position.
    pub position: Vector3,
    /// Linear velocity.
    pub velocity: Vector3,
    /// Orientation.
    pub rotation: Quaternion,
    /// Angular velocity.
    pub angular_velocity: Vector3,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Vector3,
    /// Maximum corner.
    pub max: Vector3,
}

impl Bounds {
    /// Smallest box enclosing every vertex, or `None` when there are none.
    pub fn enclosing<'a>(vertices: impl IntoIterator<Item = &'a Vector3>) -> Option<Self> {
        let mut iter = vertices.into_iter();
        let first = *iter.next()?;
        let bounds = iter.fold(Self { min: first, max: first }, |acc, v| Self {
            min: acc.min.min(*v),
            max: acc.max.max(*v),
        });
        Some(bounds)
    }

    /// Edge lengths along each axis.
    pub fn extent(&self) -> Vector3 {
        Vector3::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }
}

/// Rendered geometry approximation of an object: its vertex set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    /// Vertices in object space.
    pub vertices: Vec<Vector3>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1.0e-5
    }

    #[test]
    fn bounds_of_empty_set_is_none() {
        assert!(Bounds::enclosing(&[] as &[Vector3]).is_none());
    }

    #[test]
    fn bounds_enclose_all_vertices() {
        let vertices = [
            Vector3::new(1.0, -2.0, 3.0),
            Vector3::new(-1.0, 4.0, 0.5),
            Vector3::new(0.0, 0.0, -7.0),
        ];
        let bounds = Bounds::enclosing(&vertices);
        assert_eq!(
            bounds,
            Some(Bounds {
                min: Vector3::new(-1.0, -2.0, -7.0),
                max: Vector3::new(1.0, 4.0, 3.0),
            })
        );
    }

    #[test]
    fn single_vertex_gives_degenerate_box() {
        let v = Vector3::new(2.0, 2.0, 2.0);
        let bounds = Bounds::enclosing(&[v]);
        assert_eq!(bounds.map(|b| b.extent()), Some(Vector3::ZERO));
    }

    #[test]
    fn zero_vector_does_not_normalize() {
        assert!(Vector3::ZERO.normalized().is_none());
        let n = Vector3::new(3.0, 0.0, 4.0).normalized();
        assert!(n.is_some_and(|n| approx(n.length(), 1.0)));
    }

    #[test]
    fn rotation_between_axes_is_unit() {
        let q = Quaternion::rotation_between(Vector3::UNIT_X, Vector3::new(0.0, 1.0, 0.0));
        let norm = q.w.mul_add(q.w, q.z.mul_add(q.z, q.x.mul_add(q.x, q.y * q.y)));
        assert!(approx(norm, 1.0));
        // Quarter turn about +Z.
        assert!(approx(q.z, core::f32::consts::FRAC_1_SQRT_2));
        assert!(approx(q.w, core::f32::consts::FRAC_1_SQRT_2));
    }

    #[test]
    fn rotation_between_same_direction_is_identity() {
        let q = Quaternion::rotation_between(Vector3::UNIT_X, Vector3::new(5.0, 0.0, 0.0));
        assert!(approx(q.w, 1.0));
        assert!(approx(q.x, 0.0) && approx(q.y, 0.0) && approx(q.z, 0.0));
    }
}
