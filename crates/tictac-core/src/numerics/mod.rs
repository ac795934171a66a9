pub mod special;

use num_complex::Complex64;

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn deterministic_argsort(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_unstable_by(|lhs, rhs| {
        values[*lhs]
            .total_cmp(&values[*rhs])
            .then_with(|| lhs.cmp(rhs))
    });
    indices
}

pub fn complex_norm(values: &[Complex64]) -> f64 {
    let squares: Vec<f64> = values.iter().map(Complex64::norm_sqr).collect();
    stable_sum(&squares).sqrt()
}

pub fn all_finite(values: &[Complex64]) -> bool {
    values
        .iter()
        .all(|value| value.re.is_finite() && value.im.is_finite())
}

/// `||lhs - rhs|| / max(||lhs||, floor)`.
pub fn relative_change(lhs: &[Complex64], rhs: &[Complex64], floor: f64) -> f64 {
    let difference: Vec<Complex64> = lhs.iter().zip(rhs).map(|(a, b)| a - b).collect();
    complex_norm(&difference) / complex_norm(lhs).max(floor)
}

pub fn relative_difference(lhs: f64, rhs: f64, relative_floor: f64) -> f64 {
    let scale = lhs.abs().max(rhs.abs()).max(relative_floor);
    (lhs - rhs).abs() / scale
}
