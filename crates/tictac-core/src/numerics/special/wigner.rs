//! Angular-momentum coupling coefficients on doubled quantum numbers.
//!
//! Every `two_*` argument is `2j` or `2m`, so half-integer spins stay exact
//! integers (`two_j = 1` is spin one half).

use std::sync::OnceLock;

const MAX_FACTORIAL: usize = 170;

fn ln_factorial(n: i32) -> f64 {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut values = Vec::with_capacity(MAX_FACTORIAL + 1);
        values.push(0.0);
        for index in 1..=MAX_FACTORIAL {
            let previous = values[index - 1];
            values.push(previous + (index as f64).ln());
        }
        values
    });
    table[n as usize]
}

fn phase(exponent: i32) -> f64 {
    if exponent.rem_euclid(2) == 0 { 1.0 } else { -1.0 }
}

/// `true` when (a, b, c) satisfy the triangle rule and sum to an integer.
pub fn is_triad(two_a: i32, two_b: i32, two_c: i32) -> bool {
    two_a >= 0
        && two_b >= 0
        && two_c >= 0
        && (two_a + two_b + two_c) % 2 == 0
        && two_c <= two_a + two_b
        && two_c >= (two_a - two_b).abs()
}

fn ln_triangle_delta(two_a: i32, two_b: i32, two_c: i32) -> f64 {
    0.5 * (ln_factorial((two_a + two_b - two_c) / 2)
        + ln_factorial((two_a - two_b + two_c) / 2)
        + ln_factorial((-two_a + two_b + two_c) / 2)
        - ln_factorial((two_a + two_b + two_c) / 2 + 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wigner3jInput {
    pub two_j1: i32,
    pub two_j2: i32,
    pub two_j3: i32,
    pub two_m1: i32,
    pub two_m2: i32,
    pub two_m3: i32,
}

impl Wigner3jInput {
    pub fn new(
        two_j1: i32,
        two_j2: i32,
        two_j3: i32,
        two_m1: i32,
        two_m2: i32,
        two_m3: i32,
    ) -> Self {
        Self {
            two_j1,
            two_j2,
            two_j3,
            two_m1,
            two_m2,
            two_m3,
        }
    }
}

/// Wigner 3j symbol from the Racah sum.
pub fn wigner_3j(input: Wigner3jInput) -> f64 {
    let Wigner3jInput {
        two_j1,
        two_j2,
        two_j3,
        two_m1,
        two_m2,
        two_m3,
    } = input;

    if !is_triad(two_j1, two_j2, two_j3) || two_m1 + two_m2 + two_m3 != 0 {
        return 0.0;
    }
    if two_m1.abs() > two_j1 || two_m2.abs() > two_j2 || two_m3.abs() > two_j3 {
        return 0.0;
    }
    if (two_j1 - two_m1) % 2 != 0 || (two_j2 - two_m2) % 2 != 0 || (two_j3 - two_m3) % 2 != 0 {
        return 0.0;
    }

    let ln_prefactor = ln_triangle_delta(two_j1, two_j2, two_j3)
        + 0.5
            * (ln_factorial((two_j1 + two_m1) / 2)
                + ln_factorial((two_j1 - two_m1) / 2)
                + ln_factorial((two_j2 + two_m2) / 2)
                + ln_factorial((two_j2 - two_m2) / 2)
                + ln_factorial((two_j3 + two_m3) / 2)
                + ln_factorial((two_j3 - two_m3) / 2));

    let a = (two_j3 - two_j2 + two_m1) / 2;
    let b = (two_j3 - two_j1 - two_m2) / 2;
    let c = (two_j1 + two_j2 - two_j3) / 2;
    let d = (two_j1 - two_m1) / 2;
    let e = (two_j2 + two_m2) / 2;

    let k_min = 0.max(-a).max(-b);
    let k_max = c.min(d).min(e);
    if k_min > k_max {
        return 0.0;
    }

    let mut sum = 0.0;
    for k in k_min..=k_max {
        let ln_denominator = ln_factorial(k)
            + ln_factorial(a + k)
            + ln_factorial(b + k)
            + ln_factorial(c - k)
            + ln_factorial(d - k)
            + ln_factorial(e - k);
        sum += phase(k) * (ln_prefactor - ln_denominator).exp();
    }

    phase((two_j1 - two_j2 - two_m3) / 2) * sum
}

/// Clebsch-Gordan coefficient `<j1 m1 j2 m2 | J M>`.
pub fn clebsch_gordan(two_j1: i32, two_m1: i32, two_j2: i32, two_m2: i32, two_j: i32, two_m: i32) -> f64 {
    if two_m1 + two_m2 != two_m {
        return 0.0;
    }
    let three_j = wigner_3j(Wigner3jInput::new(two_j1, two_j2, two_j, two_m1, two_m2, -two_m));
    if three_j == 0.0 {
        return 0.0;
    }
    phase((two_j1 - two_j2 + two_m) / 2) * ((two_j + 1) as f64).sqrt() * three_j
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wigner6jInput {
    pub two_j1: i32,
    pub two_j2: i32,
    pub two_j3: i32,
    pub two_j4: i32,
    pub two_j5: i32,
    pub two_j6: i32,
}

impl Wigner6jInput {
    pub fn new(
        two_j1: i32,
        two_j2: i32,
        two_j3: i32,
        two_j4: i32,
        two_j5: i32,
        two_j6: i32,
    ) -> Self {
        Self {
            two_j1,
            two_j2,
            two_j3,
            two_j4,
            two_j5,
            two_j6,
        }
    }
}

/// Wigner 6j symbol `{j1 j2 j3; j4 j5 j6}`.
pub fn wigner_6j(input: Wigner6jInput) -> f64 {
    let Wigner6jInput {
        two_j1,
        two_j2,
        two_j3,
        two_j4,
        two_j5,
        two_j6,
    } = input;

    let triads = [
        (two_j1, two_j2, two_j3),
        (two_j1, two_j5, two_j6),
        (two_j4, two_j2, two_j6),
        (two_j4, two_j5, two_j3),
    ];
    if !triads.iter().all(|&(a, b, c)| is_triad(a, b, c)) {
        return 0.0;
    }

    let ln_deltas: f64 = triads
        .iter()
        .map(|&(a, b, c)| ln_triangle_delta(a, b, c))
        .sum();

    let sums = triads.map(|(a, b, c)| (a + b + c) / 2);
    let pairs = [
        (two_j1 + two_j2 + two_j4 + two_j5) / 2,
        (two_j2 + two_j3 + two_j5 + two_j6) / 2,
        (two_j3 + two_j1 + two_j6 + two_j4) / 2,
    ];

    let t_min = sums.iter().copied().max().unwrap_or(0);
    let t_max = pairs.iter().copied().min().unwrap_or(-1);

    let mut sum = 0.0;
    for t in t_min..=t_max {
        let mut ln_denominator = 0.0;
        for value in sums {
            ln_denominator += ln_factorial(t - value);
        }
        for value in pairs {
            ln_denominator += ln_factorial(value - t);
        }
        sum += phase(t) * (ln_deltas + ln_factorial(t + 1) - ln_denominator).exp();
    }

    sum
}

/// Wigner 9j symbol as a single sum over products of 6j symbols.
///
/// Rows are `{j11 j12 j13; j21 j22 j23; j31 j32 j33}`.
pub fn wigner_9j(rows: [[i32; 3]; 3]) -> f64 {
    let [[a, b, c], [d, e, f], [g, h, i]] = rows;

    let lower = (a - i).abs().max((d - h).abs()).max((b - f).abs());
    let upper = (a + i).min(d + h).min(b + f);
    if lower > upper {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut two_x = lower;
    while two_x <= upper {
        let weight = phase(two_x) * (two_x + 1) as f64;
        let product = wigner_6j(Wigner6jInput::new(a, b, c, f, i, two_x))
            * wigner_6j(Wigner6jInput::new(d, e, f, b, two_x, h))
            * wigner_6j(Wigner6jInput::new(g, h, i, two_x, a, d));
        sum += weight * product;
        two_x += 2;
    }

    sum
}
