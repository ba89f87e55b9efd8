//! Orthogonal projection onto a patch's mean plane.

use nalgebra::{Point2, Point3, Vector3};

/// Project a patch onto the plane through the origin orthogonal to its
/// area-weighted mean normal.
///
/// The in-plane axes form a right-handed frame with the mean normal, so a
/// triangle whose normal points to the same side as the mean keeps a positive
/// orientation. Falls back to the XY plane when the mean normal vanishes.
pub fn planar_projection(positions: &[Point3<f64>], faces: &[[usize; 3]]) -> Vec<Point2<f64>> {
    let normal = mean_normal(positions, faces);
    let (u_axis, v_axis) = plane_axes(&normal);

    positions
        .iter()
        .map(|p| {
            let d = p.coords;
            Point2::new(d.dot(&u_axis), d.dot(&v_axis))
        })
        .collect()
}

fn mean_normal(positions: &[Point3<f64>], faces: &[[usize; 3]]) -> Vector3<f64> {
    let sum: Vector3<f64> = faces
        .iter()
        .map(|f| {
            let p0 = positions[f[0]];
            (positions[f[1]] - p0).cross(&(positions[f[2]] - p0))
        })
        .sum();
    sum.try_normalize(1e-300).unwrap_or_else(Vector3::z)
}

/// Unit vectors `(u, v)` spanning the plane orthogonal to `normal`, with
/// `u × v = normal`.
fn plane_axes(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = (helper - normal * helper.dot(normal)).normalize();
    let v = normal.cross(&u);
    (u, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_keeps_tilted_plane_shape() {
        // Unit right triangle in the plane x = 2.
        let positions = vec![
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 1.0),
        ];
        let uvs = planar_projection(&positions, &[[0, 1, 2]]);
        assert!(((uvs[1] - uvs[0]).norm() - 1.0).abs() < 1e-12);
        assert!(((uvs[2] - uvs[0]).norm() - 1.0).abs() < 1e-12);
        assert!(((uvs[2] - uvs[1]).norm() - 2f64.sqrt()).abs() < 1e-12);

        let a = uvs[1] - uvs[0];
        let b = uvs[2] - uvs[0];
        assert!(a.x * b.y - a.y * b.x > 0.0);
    }

    #[test]
    fn test_plane_axes_right_handed() {
        for n in [Vector3::x(), Vector3::y(), -Vector3::z(), Vector3::new(1.0, 2.0, 3.0).normalize()] {
            let (u, v) = plane_axes(&n);
            assert!((u.cross(&v) - n).norm() < 1e-12);
            assert!(u.dot(&n).abs() < 1e-12);
        }
    }
}
