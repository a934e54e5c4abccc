//! Minimal geometry types shared by the grid and wiring engines.
#![forbid(unsafe_code)]

use core::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, rhs: Vec3) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    #[inline]
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > 0.0 { self / len } else { self }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Vec3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// One voxel address in the ship grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridCoord {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The orthogonally adjacent cell across `face`.
    #[inline]
    pub fn neighbor(self, face: Face) -> Self {
        let (dx, dy, dz) = face.delta();
        self.offset(dx, dy, dz)
    }

    /// All 6 orthogonal neighbors, paired with the face crossed to reach them.
    #[inline]
    pub fn neighbors(self) -> impl Iterator<Item = (Face, GridCoord)> {
        Face::ALL.iter().map(move |&f| (f, self.neighbor(f)))
    }

    #[inline]
    pub fn center(self) -> Vec3 {
        Vec3::new(
            self.x as f32 + 0.5,
            self.y as f32 + 0.5,
            self.z as f32 + 0.5,
        )
    }
}

/// Face index order is load-bearing: it matches the per-face arrays in the
/// grid and the deterministic neighbor traversal in the zone engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(usize)]
pub enum Face {
    Xp = 0,
    Xm = 1,
    Yp = 2,
    Ym = 3,
    Zp = 4,
    Zm = 5,
}

pub const FACE_COUNT: usize = 6;

impl Face {
    pub const ALL: [Face; FACE_COUNT] = [Face::Xp, Face::Xm, Face::Yp, Face::Ym, Face::Zp, Face::Zm];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Xp => (1, 0, 0),
            Face::Xm => (-1, 0, 0),
            Face::Yp => (0, 1, 0),
            Face::Ym => (0, -1, 0),
            Face::Zp => (0, 0, 1),
            Face::Zm => (0, 0, -1),
        }
    }

    #[inline]
    pub const fn opposite(self) -> Face {
        match self {
            Face::Xp => Face::Xm,
            Face::Xm => Face::Xp,
            Face::Yp => Face::Ym,
            Face::Ym => Face::Yp,
            Face::Zp => Face::Zm,
            Face::Zm => Face::Zp,
        }
    }

    #[inline]
    pub fn normal(self) -> Vec3 {
        let (dx, dy, dz) = self.delta();
        Vec3::new(dx as f32, dy as f32, dz as f32)
    }
}

/// Where a wire attachment sits: a point plus the outward normal of the
/// surface it was placed on. The original kept a full transform matrix; the
/// engines only ever consume position and orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttachTransform {
    pub position: Vec3,
    pub normal: Vec3,
}

impl AttachTransform {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn face_opposite_round_trips() {
        for f in Face::ALL {
            assert_eq!(f.opposite().opposite(), f);
            let (dx, dy, dz) = f.delta();
            let (ox, oy, oz) = f.opposite().delta();
            assert_eq!((dx + ox, dy + oy, dz + oz), (0, 0, 0));
        }
    }

    #[test]
    fn neighbors_are_distinct_and_adjacent() {
        let c = GridCoord::new(3, -2, 7);
        let got: Vec<GridCoord> = c.neighbors().map(|(_, n)| n).collect();
        assert_eq!(got.len(), 6);
        for n in &got {
            let d = (n.x - c.x).abs() + (n.y - c.y).abs() + (n.z - c.z).abs();
            assert_eq!(d, 1);
        }
    }

    fn coord() -> impl Strategy<Value = GridCoord> {
        let axis = -1_000_000i32..1_000_000;
        (axis.clone(), axis.clone(), axis).prop_map(|(x, y, z)| GridCoord::new(x, y, z))
    }

    fn vec3() -> impl Strategy<Value = Vec3> {
        let axis = -1.0e6f32..1.0e6;
        (axis.clone(), axis.clone(), axis).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    proptest! {
        #[test]
        fn neighbor_is_inverse_across_opposite_face(c in coord(), f: Face) {
            prop_assert_eq!(c.neighbor(f).neighbor(f.opposite()), c);
            prop_assert_eq!(f.normal() + f.opposite().normal(), Vec3::ZERO);
        }

        #[test]
        fn vec3_sub_add_round_trips(a in vec3(), b in vec3()) {
            let d = a - b;
            let back = d + b;
            let tol = 1e-3 * (1.0 + a.length() + b.length());
            prop_assert!((back - a).length() <= tol);
        }

        #[test]
        fn normalized_is_unit_length_or_zero(v in vec3()) {
            let n = v.normalized();
            if v.length() > 0.0 {
                prop_assert!((n.length() - 1.0).abs() < 1e-3);
            } else {
                prop_assert_eq!(n, Vec3::ZERO);
            }
        }
    }
}
