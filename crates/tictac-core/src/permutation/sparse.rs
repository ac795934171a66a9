use num_complex::Complex64;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet {
    pub row: usize,
    pub col: usize,
    pub value: Complex64,
}

/// Compressed-row sparse matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    dimension: usize,
    row_offsets: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<Complex64>,
}

impl SparseMatrix {
    /// Sorts, sums duplicates and drops entries with `|value| < threshold`.
    pub fn from_triplets(dimension: usize, mut triplets: Vec<Triplet>, threshold: f64) -> Self {
        triplets.sort_unstable_by(|lhs, rhs| (lhs.row, lhs.col).cmp(&(rhs.row, rhs.col)));

        let mut merged: Vec<Triplet> = Vec::with_capacity(triplets.len());
        for triplet in triplets {
            match merged.last_mut() {
                Some(last) if last.row == triplet.row && last.col == triplet.col => {
                    last.value += triplet.value;
                }
                _ => merged.push(triplet),
            }
        }
        merged.retain(|triplet| triplet.value.norm() >= threshold);

        let mut row_offsets = vec![0; dimension + 1];
        for triplet in &merged {
            row_offsets[triplet.row + 1] += 1;
        }
        for row in 0..dimension {
            row_offsets[row + 1] += row_offsets[row];
        }
        let columns = merged.iter().map(|triplet| triplet.col).collect();
        let values = merged.iter().map(|triplet| triplet.value).collect();

        Self {
            dimension,
            row_offsets,
            columns,
            values,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        match self.columns[range.clone()].binary_search(&col) {
            Ok(position) => self.values[range.start + position],
            Err(_) => Complex64::new(0.0, 0.0),
        }
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, Complex64)> + '_ {
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        self.columns[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    pub fn triplets(&self) -> impl Iterator<Item = Triplet> + '_ {
        (0..self.dimension).flat_map(move |row| {
            self.row(row)
                .map(move |(col, value)| Triplet { row, col, value })
        })
    }

    /// `y = A x`, parallel over rows.
    pub fn matvec(&self, input: &[Complex64]) -> Vec<Complex64> {
        debug_assert_eq!(input.len(), self.dimension);
        (0..self.dimension)
            .into_par_iter()
            .map(|row| {
                self.row(row)
                    .map(|(col, value)| value * input[col])
                    .sum::<Complex64>()
            })
            .collect()
    }

    /// Largest `|A_ij - A_ji|`.
    pub fn max_asymmetry(&self) -> f64 {
        self.triplets()
            .map(|triplet| (triplet.value - self.get(triplet.col, triplet.row)).norm())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::{SparseMatrix, Triplet};
    use num_complex::Complex64;

    fn triplet(row: usize, col: usize, re: f64) -> Triplet {
        Triplet {
            row,
            col,
            value: Complex64::new(re, 0.0),
        }
    }

    #[test]
    fn duplicates_are_summed_and_small_entries_dropped() {
        let matrix = SparseMatrix::from_triplets(
            3,
            vec![
                triplet(2, 0, 1.0),
                triplet(0, 1, 0.5),
                triplet(0, 1, 0.25),
                triplet(1, 1, 1.0e-12),
                triplet(2, 2, -2.0),
            ],
            1.0e-10,
        );
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(matrix.get(0, 1), Complex64::new(0.75, 0.0));
        assert_eq!(matrix.get(1, 1), Complex64::new(0.0, 0.0));
        assert_eq!(matrix.get(2, 2), Complex64::new(-2.0, 0.0));
    }

    #[test]
    fn matvec_matches_dense_product() {
        let matrix = SparseMatrix::from_triplets(
            2,
            vec![triplet(0, 0, 2.0), triplet(0, 1, -1.0), triplet(1, 0, 3.0)],
            0.0,
        );
        let product = matrix.matvec(&[Complex64::new(1.0, 1.0), Complex64::new(2.0, 0.0)]);
        assert_eq!(product[0], Complex64::new(0.0, 2.0));
        assert_eq!(product[1], Complex64::new(3.0, 3.0));
        assert!((matrix.max_asymmetry() - 4.0).abs() <= 1.0e-15);
    }
}
