//! 3x3 texture transform matrices.

use serde::{Deserialize, Serialize};

/// A row-major 3x3 transform applied to texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix3 {
    /// Row-major matrix entries.
    pub m: [f32; 9],
}

impl Matrix3 {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    /// A horizontal mirror (pre-scale by -1 on x).
    pub fn horizontal_flip() -> Self {
        Self {
            m: [-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Matrix product `self * rhs`.
    pub fn mul(&self, rhs: &Matrix3) -> Matrix3 {
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                let mut acc = 0.0;
                for k in 0..3 {
                    acc += self.m[row * 3 + k] * rhs.m[k * 3 + col];
                }
                out[row * 3 + col] = acc;
            }
        }
        Matrix3 { m: out }
    }

    /// Whether this is the identity transform.
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mul() {
        let flip = Matrix3::horizontal_flip();
        assert_eq!(Matrix3::identity().mul(&flip), flip);
        assert_eq!(flip.mul(&Matrix3::identity()), flip);
    }

    #[test]
    fn test_double_flip_is_identity() {
        let flip = Matrix3::horizontal_flip();
        assert!(flip.mul(&flip).is_identity());
    }
}
