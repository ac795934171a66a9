//! Geometry of the cyclic exchange between Jacobi partitions.
//!
//! Partition 1 has pair (2,3) with relative momentum `p` and spectator 1 with
//! momentum `q`; partition 2 has pair (3,1) and spectator 2. The overlap
//! `<p q|p' q'>` fixes `p = q' + q/2` and `p' = -q - q'/2`.

use crate::basis::Channel;
use crate::common::constants::PI;
use crate::numerics::special::{clebsch_gordan, is_triad, wigner_9j, y_lm_direction};
use num_complex::Complex64;

/// Jacobi momenta `(p, q)` of one partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobiPair {
    pub p: [f64; 3],
    pub q: [f64; 3],
}

impl JacobiPair {
    /// Relabels to the next partition: `p' = -p/2 + 3q/4`, `q' = -p - q/2`.
    pub fn cycled(&self) -> Self {
        let mut p = [0.0; 3];
        let mut q = [0.0; 3];
        for axis in 0..3 {
            p[axis] = -0.5 * self.p[axis] + 0.75 * self.q[axis];
            q[axis] = -self.p[axis] - 0.5 * self.q[axis];
        }
        Self { p, q }
    }

    /// `p^2 + 3/4 q^2`, invariant under relabeling.
    pub fn kinetic_measure(&self) -> f64 {
        let p2: f64 = self.p.iter().map(|c| c * c).sum();
        let q2: f64 = self.q.iter().map(|c| c * c).sum();
        p2 + 0.75 * q2
    }
}

/// Momenta entering one exchange matrix element with `q` along `z` and `q'`
/// in the `xz` plane at cosine `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeGeometry {
    pub p: [f64; 3],
    pub p_prime: [f64; 3],
    pub q_prime: [f64; 3],
}

impl ExchangeGeometry {
    pub fn new(q: f64, q_prime: f64, x: f64) -> Self {
        let sine = (1.0 - x * x).max(0.0).sqrt();
        let q_prime_vector = [q_prime * sine, 0.0, q_prime * x];
        let q_vector = [0.0, 0.0, q];
        let mut p = [0.0; 3];
        let mut p_prime = [0.0; 3];
        for axis in 0..3 {
            p[axis] = q_prime_vector[axis] + 0.5 * q_vector[axis];
            p_prime[axis] = -q_vector[axis] - 0.5 * q_prime_vector[axis];
        }
        Self {
            p,
            p_prime,
            q_prime: q_prime_vector,
        }
    }
}

/// `|p|` and `|p'|` of the exchange geometry.
pub fn exchange_magnitudes(q: f64, q_prime: f64, x: f64) -> (f64, f64) {
    let mixed = q * q_prime * x;
    let bra = (q_prime * q_prime + 0.25 * q * q + mixed).max(0.0).sqrt();
    let ket = (q * q + 0.25 * q_prime * q_prime + mixed).max(0.0).sqrt();
    (bra, ket)
}

/// Spherical harmonics of the three directions up to `max_degree`.
#[derive(Debug, Clone)]
pub struct HarmonicTable {
    max_degree: u32,
    p: Vec<Complex64>,
    p_prime: Vec<Complex64>,
    q_prime: Vec<Complex64>,
}

impl HarmonicTable {
    pub fn new(geometry: &ExchangeGeometry, max_degree: u32) -> Self {
        let fill = |vector: [f64; 3]| {
            let mut values = Vec::with_capacity(((max_degree + 1) * (max_degree + 1)) as usize);
            for degree in 0..=max_degree as i32 {
                for order in -degree..=degree {
                    values.push(y_lm_direction(degree, order, vector));
                }
            }
            values
        };
        Self {
            max_degree,
            p: fill(geometry.p),
            p_prime: fill(geometry.p_prime),
            q_prime: fill(geometry.q_prime),
        }
    }

    fn slot(degree: u32, order: i32) -> usize {
        (degree * degree) as usize + (order + degree as i32) as usize
    }

    fn p(&self, degree: u32, order: i32) -> Complex64 {
        debug_assert!(degree <= self.max_degree);
        self.p[Self::slot(degree, order)]
    }

    fn p_prime(&self, degree: u32, order: i32) -> Complex64 {
        self.p_prime[Self::slot(degree, order)]
    }

    fn q_prime(&self, degree: u32, order: i32) -> Complex64 {
        self.q_prime[Self::slot(degree, order)]
    }
}

/// `8 pi^2 / (2L+1) sum_M Y*_{(l lambda) L M}(p, z) Y_{(l' lambda') L M}(p', q')`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalKernel {
    l: u32,
    l_prime: u32,
    lambda_prime: u32,
    bra: Vec<(i32, f64)>,
    ket: Vec<(i32, i32, f64)>,
    prefactor: f64,
}

impl OrbitalKernel {
    pub fn new(l: u32, lambda: u32, l_prime: u32, lambda_prime: u32, big_l: u32) -> Self {
        let (tl, tlam, tlp, tlamp, tbig) = (
            2 * l as i32,
            2 * lambda as i32,
            2 * l_prime as i32,
            2 * lambda_prime as i32,
            2 * big_l as i32,
        );
        // Y_{lambda mu}(z) = delta_{mu 0} sqrt((2 lambda + 1) / 4 pi).
        let axis = ((2 * lambda + 1) as f64 / (4.0 * PI)).sqrt();
        let mut bra = Vec::new();
        let mut ket = Vec::new();
        for m in -(big_l as i32)..=(big_l as i32) {
            if m.unsigned_abs() <= l {
                let cg = clebsch_gordan(tl, 2 * m, tlam, 0, tbig, 2 * m);
                if cg != 0.0 {
                    bra.push((m, cg * axis));
                }
            }
            for m_prime in -(l_prime as i32)..=(l_prime as i32) {
                let mu = m - m_prime;
                if mu.unsigned_abs() > lambda_prime {
                    continue;
                }
                let cg = clebsch_gordan(tlp, 2 * m_prime, tlamp, 2 * mu, tbig, 2 * m);
                if cg != 0.0 {
                    ket.push((m, m_prime, cg));
                }
            }
        }
        Self {
            l,
            l_prime,
            lambda_prime,
            bra,
            ket,
            prefactor: 8.0 * PI * PI / (2 * big_l + 1) as f64,
        }
    }

    pub fn max_degree(&self) -> u32 {
        self.l.max(self.l_prime).max(self.lambda_prime)
    }

    pub fn evaluate(&self, table: &HarmonicTable) -> f64 {
        let mut total = Complex64::new(0.0, 0.0);
        for (m, bra) in &self.bra {
            let mut ket_sum = Complex64::new(0.0, 0.0);
            for (ket_m, m_prime, cg) in &self.ket {
                if ket_m != m {
                    continue;
                }
                ket_sum += *cg
                    * table.p_prime(self.l_prime, *m_prime)
                    * table.q_prime(self.lambda_prime, m - m_prime);
            }
            total += *bra * table.p(self.l, *m).conj() * ket_sum;
        }
        self.prefactor * total.re
    }
}

// Three spin-1/2 (or isospin-1/2) particles; doubled projections.
const HALF: [i32; 2] = [1, -1];

// <m1 m2 m3|(a b) s, c; S M> with pair spins on slots (a, b) and spectator on c.
fn coupled_amplitude(two_s: i32, two_total: i32, two_m: i32, pair: (i32, i32), spectator: i32) -> f64 {
    let pair_m = pair.0 + pair.1;
    clebsch_gordan(1, pair.0, 1, pair.1, two_s, pair_m)
        * clebsch_gordan(two_s, pair_m, 1, spectator, two_total, two_m)
}

/// `<(2 3) s, 1; S|(3 1) s', 2; S>` for three spin-1/2 particles.
pub fn spin_recoupling(two_total: i32, s_bra: u32, s_ket: u32) -> f64 {
    let (two_s, two_s_prime) = (2 * s_bra as i32, 2 * s_ket as i32);
    if !is_triad(two_s, 1, two_total) || !is_triad(two_s_prime, 1, two_total) {
        return 0.0;
    }
    let two_m = two_total;
    let mut overlap = 0.0;
    for m1 in HALF {
        for m2 in HALF {
            for m3 in HALF {
                let bra = coupled_amplitude(two_s, two_total, two_m, (m2, m3), m1);
                let ket = coupled_amplitude(two_s_prime, two_total, two_m, (m3, m1), m2);
                overlap += bra * ket;
            }
        }
    }
    overlap
}

/// `<(l s) j, (lambda 1/2) I; J|(l lambda) L, (s 1/2) S; J>`.
pub fn jj_to_ls(channel: &Channel, big_l: u32, two_s_total: u32) -> f64 {
    let rows = [
        [2 * channel.l as i32, 2 * channel.s as i32, 2 * channel.j as i32],
        [2 * channel.lambda as i32, 1, channel.two_i as i32],
        [2 * big_l as i32, two_s_total as i32, channel.two_j as i32],
    ];
    let hats = ((2 * channel.j + 1) * (channel.two_i + 1) * (2 * big_l + 1) * (two_s_total + 1))
        as f64;
    hats.sqrt() * wigner_9j(rows)
}

/// `G_{alpha alpha'}(q, q', x) = sum_L coefficient_L K^L`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCoupling {
    terms: Vec<(f64, OrbitalKernel)>,
}

impl ChannelCoupling {
    /// `None` when the two channels do not couple through the exchange.
    pub fn between(bra: &Channel, ket: &Channel) -> Option<Self> {
        if bra.two_j != ket.two_j || bra.two_t != ket.two_t || bra.parity() != ket.parity() {
            return None;
        }
        let isospin = spin_recoupling(bra.two_t as i32, bra.t, ket.t);
        if isospin == 0.0 {
            return None;
        }

        let big_l_min = bra.l.abs_diff(bra.lambda).max(ket.l.abs_diff(ket.lambda));
        let big_l_max = (bra.l + bra.lambda).min(ket.l + ket.lambda);
        let mut terms = Vec::new();
        for big_l in big_l_min..=big_l_max {
            let mut coefficient = 0.0;
            for two_s_total in [1_u32, 3] {
                let spin = spin_recoupling(two_s_total as i32, bra.s, ket.s);
                if spin == 0.0 {
                    continue;
                }
                coefficient += jj_to_ls(bra, big_l, two_s_total)
                    * jj_to_ls(ket, big_l, two_s_total)
                    * spin;
            }
            coefficient *= isospin;
            if coefficient.abs() > 1.0e-14 {
                terms.push((
                    coefficient,
                    OrbitalKernel::new(bra.l, bra.lambda, ket.l, ket.lambda, big_l),
                ));
            }
        }
        (!terms.is_empty()).then_some(Self { terms })
    }

    pub fn max_degree(&self) -> u32 {
        self.terms
            .iter()
            .map(|(_, kernel)| kernel.max_degree())
            .max()
            .unwrap_or(0)
    }

    pub fn evaluate(&self, table: &HarmonicTable) -> f64 {
        self.terms
            .iter()
            .map(|(coefficient, kernel)| coefficient * kernel.evaluate(table))
            .sum()
    }
}
