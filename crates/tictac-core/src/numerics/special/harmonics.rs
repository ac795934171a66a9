use crate::common::constants::PI;
use num_complex::Complex64;

/// Spherical harmonic `Y_l^m(theta, phi)` with the Condon-Shortley phase.
pub fn y_lm(degree: i32, order: i32, theta: f64, phi: f64) -> Complex64 {
    debug_assert!(degree >= 0 && order.abs() <= degree);

    let positive_order = order.unsigned_abs() as usize;
    let magnitude = normalized_legendre(degree as usize, positive_order, theta.cos());
    let value = Complex64::from_polar(magnitude, positive_order as f64 * phi);
    if order >= 0 {
        value
    } else if positive_order % 2 == 0 {
        value.conj()
    } else {
        -value.conj()
    }
}

/// Spherical harmonic evaluated at the direction of `vector`.
///
/// A zero vector is treated as pointing along `+z`.
pub fn y_lm_direction(degree: i32, order: i32, vector: [f64; 3]) -> Complex64 {
    let (theta, phi) = polar_angles(vector);
    y_lm(degree, order, theta, phi)
}

pub fn polar_angles(vector: [f64; 3]) -> (f64, f64) {
    let [x, y, z] = vector;
    let norm = (x * x + y * y + z * z).sqrt();
    if norm <= f64::MIN_POSITIVE {
        return (0.0, 0.0);
    }
    let theta = (z / norm).clamp(-1.0, 1.0).acos();
    let phi = if x == 0.0 && y == 0.0 { 0.0 } else { y.atan2(x) };
    (theta, phi)
}

// sqrt((2l+1)/(4 pi) (l-m)!/(l+m)!) P_l^m(x)
fn normalized_legendre(degree: usize, order: usize, x: f64) -> f64 {
    let mut ratio = 1.0;
    for term in (degree - order + 1)..=(degree + order) {
        ratio /= term as f64;
    }
    let normalization = ((2 * degree + 1) as f64 * ratio / (4.0 * PI)).sqrt();
    normalization * associated_legendre(degree, order, x)
}

fn associated_legendre(degree: usize, order: usize, x: f64) -> f64 {
    let mut diagonal = 1.0;
    if order > 0 {
        let sine = (1.0 - x * x).max(0.0).sqrt();
        for k in 1..=order {
            diagonal *= -((2 * k - 1) as f64) * sine;
        }
    }
    if degree == order {
        return diagonal;
    }

    let mut previous = diagonal;
    let mut current = x * (2 * order + 1) as f64 * diagonal;
    for l in (order + 2)..=degree {
        let next = ((2 * l - 1) as f64 * x * current - (l + order - 1) as f64 * previous)
            / (l - order) as f64;
        previous = current;
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::{polar_angles, y_lm, y_lm_direction};
    use crate::common::constants::PI;
    use num_complex::Complex64;

    #[test]
    fn y_lm_matches_known_values() {
        let y00 = y_lm(0, 0, 1.2, -0.8);
        assert_complex_close("Y_0^0", Complex64::new((1.0 / (4.0 * PI)).sqrt(), 0.0), y00);

        let theta = PI / 3.0;
        let y10 = y_lm(1, 0, theta, 0.4);
        assert_complex_close(
            "Y_1^0",
            Complex64::new((3.0 / (4.0 * PI)).sqrt() * theta.cos(), 0.0),
            y10,
        );

        let y11 = y_lm(1, 1, PI / 2.0, 0.0);
        assert_complex_close("Y_1^1", Complex64::new(-(3.0 / (8.0 * PI)).sqrt(), 0.0), y11);
    }

    #[test]
    fn addition_theorem_sum_rule_holds() {
        for degree in [0, 1, 2, 4] {
            let expected = (2 * degree + 1) as f64 / (4.0 * PI);
            let total: f64 = (-degree..=degree)
                .map(|order| y_lm(degree, order, 0.7, 2.1).norm_sqr())
                .sum();
            assert!(
                (total - expected).abs() <= 1.0e-12,
                "l={degree} expected={expected:.15e} actual={total:.15e}"
            );
        }
    }

    #[test]
    fn direction_form_agrees_with_angle_form() {
        let vector = [-0.3, 0.0, 0.8];
        let (theta, phi) = polar_angles(vector);
        assert!((phi - PI).abs() <= 1.0e-15);
        for order in -2..=2 {
            assert_complex_close(
                &format!("m={order}"),
                y_lm(2, order, theta, phi),
                y_lm_direction(2, order, vector),
            );
        }
    }

    #[test]
    fn zero_vector_points_along_z() {
        assert_eq!(polar_angles([0.0, 0.0, 0.0]), (0.0, 0.0));
        assert!(y_lm_direction(3, 1, [0.0, 0.0, 0.0]).norm() <= 1.0e-15);
    }

    fn assert_complex_close(label: &str, expected: Complex64, actual: Complex64) {
        let abs_diff = (actual - expected).norm();
        assert!(
            abs_diff <= 1.0e-13,
            "{label} expected=({:.15e},{:.15e}) actual=({:.15e},{:.15e})",
            expected.re,
            expected.im,
            actual.re,
            actual.im,
        );
    }
}
