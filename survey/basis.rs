use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use ndarray_linalg::SVD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Defines the strategy for placing the internal knots of a spline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnotStrategy {
    /// Place knots uniformly across the observed range.
    #[default]
    Uniform,
    /// Place knots at the quantiles of the observed values.
    Quantile,
}

/// A comprehensive error type for all operations within the basis module.
#[derive(Error, Debug)]
pub enum BasisError {
    #[error("Spline degree must be at least 1, but was {0}.")]
    InvalidDegree(usize),

    #[error("Data range is invalid: start ({0}) must be less than end ({1}).")]
    InvalidRange(f64, f64),

    #[error("Quantile strategy requires a non-empty data set for quantile calculation.")]
    QuantileDataMissing,

    #[error("Cannot compute {num_quantiles} quantiles from only {num_points} data points.")]
    InsufficientDataForQuantiles {
        num_quantiles: usize,
        num_points: usize,
    },

    #[error("SVD returned no right singular vectors for the constraint.")]
    MissingSingularVectors,

    #[error("Decomposition failed while applying the sum-to-zero constraint: {0}")]
    LinalgError(#[from] ndarray_linalg::error::LinalgError),
}

/// Creates a B-spline basis expansion matrix and its corresponding knot vector.
///
/// Evaluation uses the Cox-de Boor recurrence one point at a time.
///
/// # Arguments
///
/// * `data`: The values to expand.
/// * `quantile_source`: Values whose quantiles give the internal knots. When
///   `None` the internal knots are spaced uniformly over `data_range`.
/// * `data_range`: `(min, max)` boundary knots. Must be the range the basis
///   was first built on whenever the basis is re-evaluated at new points.
/// * `num_internal_knots`: Knots placed strictly between the boundaries.
/// * `degree`: Polynomial degree (3 for cubic).
///
/// # Returns
///
/// The basis matrix with `num_internal_knots + degree + 1` columns, and the
/// full knot vector.
pub fn create_bspline_basis(
    data: ArrayView1<f64>,
    quantile_source: Option<ArrayView1<f64>>,
    data_range: (f64, f64),
    num_internal_knots: usize,
    degree: usize,
) -> Result<(Array2<f64>, Array1<f64>), BasisError> {
    if degree < 1 {
        return Err(BasisError::InvalidDegree(degree));
    }
    if data_range.0 >= data_range.1 {
        return Err(BasisError::InvalidRange(data_range.0, data_range.1));
    }

    let knot_vector =
        internal::generate_full_knot_vector(data_range, num_internal_knots, degree, quantile_source)?;

    // n = k - d - 1 basis functions for k knots of degree d.
    let num_basis_functions = knot_vector.len() - degree - 1;

    let mut basis_matrix = Array2::zeros((data.len(), num_basis_functions));
    for (i, &x) in data.iter().enumerate() {
        let basis_row = internal::evaluate_splines_at_point(x, degree, knot_vector.view());
        basis_matrix.row_mut(i).assign(&basis_row);
    }

    Ok((basis_matrix, knot_vector))
}

/// Reparameterises a basis so that its columns sum to zero over the data,
/// removing the confounding between the spline and the intercept.
///
/// Returns the constrained basis (one fewer column) and the transform `Z`
/// with `B_constrained = B Z`.
pub fn apply_sum_to_zero_constraint(
    basis_matrix: ArrayView2<f64>,
) -> Result<(Array2<f64>, Array2<f64>), BasisError> {
    // Constraint row c' = 1' B.
    let constraint = basis_matrix.sum_axis(Axis(0)).insert_axis(Axis(0));

    // The full right singular vectors of c' span R^n; all but the first are
    // orthogonal to c and form the null space.
    let (_, _, vt) = constraint.svd(false, true)?;
    let vt = vt.ok_or(BasisError::MissingSingularVectors)?;
    let z_transform = vt.slice(s![1.., ..]).t().to_owned();

    let constrained_basis = basis_matrix.dot(&z_transform);
    Ok((constrained_basis, z_transform))
}

/// A constrained B-spline expansion frozen on the data it was built from.
#[derive(Debug, Clone)]
pub struct SplineBasis {
    knots: Array1<f64>,
    degree: usize,
    constraint: Array2<f64>,
    range: (f64, f64),
}

impl SplineBasis {
    /// Builds knots and the sum-to-zero transform from `data`, and returns the
    /// basis together with its expansion of `data`.
    pub fn fit(
        data: ArrayView1<f64>,
        num_internal_knots: usize,
        degree: usize,
        strategy: KnotStrategy,
    ) -> Result<(Self, Array2<f64>), BasisError> {
        let range = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
        let quantile_source = match strategy {
            KnotStrategy::Uniform => None,
            KnotStrategy::Quantile => Some(data),
        };
        let (raw_basis, knots) =
            create_bspline_basis(data, quantile_source, range, num_internal_knots, degree)?;
        let (constrained, constraint) = apply_sum_to_zero_constraint(raw_basis.view())?;
        Ok((
            Self {
                knots,
                degree,
                constraint,
                range,
            },
            constrained,
        ))
    }

    /// Expands new points with the frozen knots. Points are clamped to the
    /// range the basis was built on.
    pub fn evaluate(&self, data: ArrayView1<f64>) -> Array2<f64> {
        let num_basis = self.knots.len() - self.degree - 1;
        let mut raw = Array2::zeros((data.len(), num_basis));
        for (i, &x) in data.iter().enumerate() {
            let clamped = x.clamp(self.range.0, self.range.1);
            raw.row_mut(i).assign(&internal::evaluate_splines_at_point(
                clamped,
                self.degree,
                self.knots.view(),
            ));
        }
        raw.dot(&self.constraint)
    }

    pub fn n_columns(&self) -> usize {
        self.constraint.ncols()
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }
}

mod internal {
    use super::*;

    /// Generates the full knot vector, including repeated boundary knots.
    pub(super) fn generate_full_knot_vector(
        data_range: (f64, f64),
        num_internal_knots: usize,
        degree: usize,
        quantile_source: Option<ArrayView1<f64>>,
    ) -> Result<Array1<f64>, BasisError> {
        let (min_val, max_val) = data_range;

        let internal_knots = if let Some(source) = quantile_source {
            if source.is_empty() {
                return Err(BasisError::QuantileDataMissing);
            }
            if source.len() < num_internal_knots {
                return Err(BasisError::InsufficientDataForQuantiles {
                    num_quantiles: num_internal_knots,
                    num_points: source.len(),
                });
            }
            quantiles(source, num_internal_knots)
        } else if num_internal_knots == 0 {
            Array1::from_vec(vec![])
        } else {
            let h = (max_val - min_val) / (num_internal_knots as f64 + 1.0);
            Array::from_iter((1..=num_internal_knots).map(|i| min_val + i as f64 * h))
        };

        // `degree + 1` repeated knots at each boundary.
        let knots: Vec<f64> = std::iter::repeat_n(min_val, degree + 1)
            .chain(internal_knots.iter().copied())
            .chain(std::iter::repeat_n(max_val, degree + 1))
            .collect();
        Ok(Array1::from_vec(knots))
    }

    /// Quantiles by linear interpolation (Type 7 in R).
    fn quantiles(data: ArrayView1<f64>, num_quantiles: usize) -> Array1<f64> {
        let mut sorted_data = data.to_vec();
        sorted_data.sort_unstable_by(|a, b| a.total_cmp(b));

        let n = sorted_data.len();
        (1..=num_quantiles)
            .map(|k| {
                let p = k as f64 / (num_quantiles as f64 + 1.0);
                let float_idx = (n as f64 - 1.0) * p;
                let lower_idx = float_idx.floor() as usize;
                let upper_idx = float_idx.ceil() as usize;

                if lower_idx == upper_idx {
                    sorted_data[lower_idx]
                } else {
                    let fraction = float_idx - lower_idx as f64;
                    sorted_data[lower_idx] * (1.0 - fraction) + sorted_data[upper_idx] * fraction
                }
            })
            .collect()
    }

    /// Evaluates all B-spline basis functions at a single point `x`.
    pub(super) fn evaluate_splines_at_point(
        x: f64,
        degree: usize,
        knots: ArrayView1<f64>,
    ) -> Array1<f64> {
        let num_knots = knots.len();
        let num_basis = num_knots - degree - 1;

        // Knot interval `mu` with knots[mu] <= x < knots[mu + 1], clamped to
        // the valid span so the right boundary belongs to the last interval.
        let mu = match knots.iter().rposition(|&k| k <= x) {
            Some(pos) => pos.min(num_basis - 1).max(degree),
            None => degree,
        };

        let mut b = Array1::zeros(degree + 1);
        b[0] = 1.0;

        for d in 1..=degree {
            let b_old = b.clone();
            b.fill(0.0);

            for i in 0..=d {
                let idx = mu + i - d;

                if i < d && b_old[i] > 0.0 {
                    let left = knots[idx + d + 1] - knots[idx + 1];
                    if left > 1e-12 {
                        b[i] += (knots[idx + d + 1] - x) / left * b_old[i];
                    }
                }

                if i > 0 && b_old[i - 1] > 0.0 {
                    let right = knots[idx + d] - knots[idx];
                    if right > 1e-12 {
                        b[i] += (x - knots[idx]) / right * b_old[i - 1];
                    }
                }
            }
        }

        let mut basis_values = Array1::zeros(num_basis);
        let start_index = mu - degree;
        for (i, value) in b.iter().enumerate() {
            basis_values[start_index + i] = *value;
        }
        basis_values
    }
}
