const SERIES_THRESHOLD: f64 = 1.5;
const SERIES_TOLERANCE: f64 = 1.0e-17;
const SERIES_MAX_TERMS: usize = 500;

/// Legendre function of the second kind `Q_l(z)` for real `z > 1`.
///
/// Returns `None` for `z <= 1`, where the function is singular or complex.
/// Large arguments use the hypergeometric series, which avoids the
/// cancellation of the upward recursion.
pub fn legendre_q(degree: u32, z: f64) -> Option<f64> {
    if !(z > 1.0) || !z.is_finite() {
        return None;
    }
    if z > SERIES_THRESHOLD {
        return Some(series(degree, z));
    }

    let q0 = 0.5 * ((z + 1.0) / (z - 1.0)).ln();
    if degree == 0 {
        return Some(q0);
    }
    let mut previous = q0;
    let mut current = z * q0 - 1.0;
    for l in 1..degree {
        let l = l as f64;
        let next = ((2.0 * l + 1.0) * z * current - l * previous) / (l + 1.0);
        previous = current;
        current = next;
    }
    Some(current)
}

// Q_l(z) = l! / (2l+1)!! z^-(l+1) 2F1((l+1)/2, (l+2)/2; l+3/2; z^-2)
fn series(degree: u32, z: f64) -> f64 {
    let l = degree as f64;
    let mut prefactor = 1.0 / z;
    for k in 1..=degree {
        prefactor *= k as f64 / ((2 * k + 1) as f64 * z);
    }

    let a = 0.5 * (l + 1.0);
    let b = 0.5 * (l + 2.0);
    let c = l + 1.5;
    let w = 1.0 / (z * z);

    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 0..SERIES_MAX_TERMS {
        let k = k as f64;
        term *= (a + k) * (b + k) / ((c + k) * (k + 1.0)) * w;
        sum += term;
        if term.abs() <= SERIES_TOLERANCE * sum.abs() {
            break;
        }
    }
    prefactor * sum
}

#[cfg(test)]
mod tests {
    use super::legendre_q;

    #[test]
    fn low_orders_match_closed_forms() {
        for z in [1.1_f64, 1.4, 2.5, 7.0] {
            let q0 = 0.5 * ((z + 1.0) / (z - 1.0)).ln();
            let q1 = z * q0 - 1.0;
            let q2 = 0.5 * (3.0 * z * z - 1.0) * q0 - 1.5 * z;
            let cases = [(0, q0), (1, q1), (2, q2)];
            for (degree, expected) in cases {
                let actual = legendre_q(degree, z).expect("z > 1 is in the domain");
                let tolerance = 1.0e-12_f64.max(expected.abs() * 1.0e-9);
                assert!(
                    (actual - expected).abs() <= tolerance,
                    "l={degree} z={z} expected={expected:.15e} actual={actual:.15e}"
                );
            }
        }
    }

    #[test]
    fn series_and_recursion_agree_at_the_switch() {
        for degree in 0..5 {
            let below = legendre_q(degree, 1.5).expect("domain");
            let above = legendre_q(degree, 1.5 + 1.0e-12).expect("domain");
            assert!(
                (below - above).abs() <= 1.0e-9 * below.abs(),
                "l={degree} below={below:.15e} above={above:.15e}"
            );
        }
    }

    #[test]
    fn large_argument_decays_as_inverse_power() {
        let z: f64 = 1.0e4;
        let q2 = legendre_q(2, z).expect("domain");
        let leading = 2.0 / (15.0 * z.powi(3));
        assert!((q2 / leading - 1.0).abs() <= 1.0e-6);
    }

    #[test]
    fn arguments_outside_the_domain_are_rejected() {
        assert_eq!(legendre_q(0, 1.0), None);
        assert_eq!(legendre_q(3, 0.5), None);
        assert_eq!(legendre_q(1, f64::NAN), None);
    }
}
