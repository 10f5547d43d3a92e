use super::structure::{CrystalError, reduce_direction};
use nalgebra::{Matrix3, Vector3};

/// Cell axis of the dislocation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    /// In-plane direction of the glide plane.
    X,
    /// Glide-plane normal.
    Y,
    /// Dislocation line.
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Three mutually orthogonal lattice directions forming a right-handed frame.
///
/// `x` lies in the glide plane, `y` is the glide-plane normal and `z` is the
/// line direction. The rotation matrix holds the unit axes as rows, so
/// `rotation * v` maps a crystal-frame vector into the dislocation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrystalOrientation {
    directions: [[i32; 3]; 3],
    rotation: Matrix3<f64>,
}

impl CrystalOrientation {
    pub fn new(x: [i32; 3], y: [i32; 3], z: [i32; 3]) -> Result<Self, CrystalError> {
        let directions = [reduce_direction(x)?, reduce_direction(y)?, reduce_direction(z)?];
        for (i, j) in [(0, 1), (1, 2), (0, 2)] {
            if int_dot(&directions[i], &directions[j]) != 0 {
                return Err(CrystalError::NotOrthogonal {
                    first: directions[i],
                    second: directions[j],
                });
            }
        }
        if int_dot(&int_cross(&directions[0], &directions[1]), &directions[2]) <= 0 {
            return Err(CrystalError::LeftHanded { x, y, z });
        }

        let mut rotation = Matrix3::zeros();
        for (row, d) in directions.iter().enumerate() {
            let v = Vector3::new(d[0] as f64, d[1] as f64, d[2] as f64).normalize();
            rotation.set_row(row, &v.transpose());
        }
        Ok(Self {
            directions,
            rotation,
        })
    }

    /// Orientation from the line direction and the glide-plane normal; the
    /// in-plane axis completes the right-handed frame.
    pub fn from_line_and_normal(line: [i32; 3], normal: [i32; 3]) -> Result<Self, CrystalError> {
        let x = int_cross(&normal, &line);
        if x == [0, 0, 0] {
            return Err(CrystalError::NotOrthogonal {
                first: normal,
                second: line,
            });
        }
        Self::new(x, normal, line)
    }

    /// Cell axes along the cube edges.
    pub fn cubic() -> Self {
        Self {
            directions: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            rotation: Matrix3::identity(),
        }
    }

    pub fn directions(&self) -> &[[i32; 3]; 3] {
        &self.directions
    }

    pub fn direction(&self, axis: Axis) -> [i32; 3] {
        self.directions[axis.index()]
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// Crystal-frame vector expressed in the dislocation frame.
    pub fn to_frame(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * v
    }

    pub fn to_crystal(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * v
    }
}

fn int_dot(a: &[i32; 3], b: &[i32; 3]) -> i64 {
    a.iter().zip(b).map(|(&x, &y)| x as i64 * y as i64).sum()
}

fn int_cross(a: &[i32; 3], b: &[i32; 3]) -> [i32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
