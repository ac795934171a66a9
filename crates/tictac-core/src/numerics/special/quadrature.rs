use crate::common::constants::PI;

const NEWTON_TOLERANCE: f64 = 1.0e-15;
const NEWTON_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum QuadratureError {
    #[error("quadrature rule requires at least one point")]
    NoPoints,
    #[error("Newton iteration for Gauss-Legendre node {index} of {points} did not converge")]
    NodeNotConverged { index: usize, points: usize },
    #[error("invalid integration interval [{lower}, {upper}]")]
    InvalidInterval { lower: f64, upper: f64 },
}

/// Gauss-Legendre rule on `[-1, 1]`, nodes ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    pub fn new(points: usize) -> Result<Self, QuadratureError> {
        if points == 0 {
            return Err(QuadratureError::NoPoints);
        }

        let mut nodes = vec![0.0; points];
        let mut weights = vec![0.0; points];
        let n = points as f64;
        for index in 0..points.div_ceil(2) {
            let mut x = (PI * (index as f64 + 0.75) / (n + 0.5)).cos();
            let mut derivative = 0.0;
            let mut converged = false;
            for _ in 0..NEWTON_MAX_ITERATIONS {
                let (value, slope) = legendre_with_derivative(points, x);
                derivative = slope;
                let step = value / slope;
                x -= step;
                if step.abs() <= NEWTON_TOLERANCE {
                    converged = true;
                    break;
                }
            }
            if !converged {
                return Err(QuadratureError::NodeNotConverged { index, points });
            }
            let (_, slope) = legendre_with_derivative(points, x);
            if slope != 0.0 {
                derivative = slope;
            }
            let weight = 2.0 / ((1.0 - x * x) * derivative * derivative);
            nodes[index] = -x;
            nodes[points - 1 - index] = x;
            weights[index] = weight;
            weights[points - 1 - index] = weight;
        }

        Ok(Self { nodes, weights })
    }

    /// One-point rule used by the midpoint approximation.
    pub fn midpoint() -> Self {
        Self {
            nodes: vec![0.0],
            weights: vec![2.0],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Nodes and weights mapped onto `[lower, upper]`.
    pub fn mapped(&self, lower: f64, upper: f64) -> Result<Vec<(f64, f64)>, QuadratureError> {
        if !(lower.is_finite() && upper.is_finite()) || upper < lower {
            return Err(QuadratureError::InvalidInterval { lower, upper });
        }
        let half_width = 0.5 * (upper - lower);
        let centre = 0.5 * (upper + lower);
        Ok(self
            .nodes
            .iter()
            .zip(&self.weights)
            .map(|(node, weight)| (centre + half_width * node, half_width * weight))
            .collect())
    }

    pub fn integrate(
        &self,
        lower: f64,
        upper: f64,
        integrand: impl Fn(f64) -> f64,
    ) -> Result<f64, QuadratureError> {
        Ok(self
            .mapped(lower, upper)?
            .into_iter()
            .map(|(x, w)| w * integrand(x))
            .sum())
    }
}

fn legendre_with_derivative(degree: usize, x: f64) -> (f64, f64) {
    let mut previous = 1.0;
    let mut current = x;
    if degree == 0 {
        return (1.0, 0.0);
    }
    for l in 2..=degree {
        let next = ((2 * l - 1) as f64 * x * current - (l - 1) as f64 * previous) / l as f64;
        previous = current;
        current = next;
    }
    let derivative = degree as f64 * (x * current - previous) / (x * x - 1.0);
    (current, derivative)
}
