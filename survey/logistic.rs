//! # Survey-weighted logistic regression
//!
//! Point estimates maximise the weighted Bernoulli pseudo-likelihood by
//! iteratively reweighted least squares with step-halving. Variances come
//! from the Taylor-linearised sandwich `A^-1 B A^-1`, where `A` is the
//! weighted information matrix and `B` the with-replacement covariance of
//! PSU score totals within strata.
//!
//! Only the analysed respondents enter `A`. Every PSU of the bound design
//! enters `B`, including PSUs whose respondents all fall outside the model's
//! domain; their score totals are zero.

use crate::survey::design::BoundDesign;
use crate::survey::types::{Coefficients, LinearPredictor};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::{Inverse, SVD, Solve};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PROB_EPS: f64 = 1e-8;
const MIN_WEIGHT: f64 = 1e-10;
const MAX_STEP_HALVINGS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative deviance change below which IRLS stops.
    pub tolerance: f64,
    pub min_rows: usize,
    /// Largest accepted condition number of the information matrix.
    pub max_condition: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-8,
            min_rows: 20,
            max_condition: 1e12,
        }
    }
}

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Only {found} complete respondents are available; at least {required} are needed.")]
    TooFewRows { found: usize, required: usize },

    #[error("The information matrix is ill-conditioned (condition number: {condition:.2e}); predictors are collinear or separated.")]
    IllConditioned { condition: f64 },

    #[error("A linear system solve failed: {0}")]
    LinearSystemSolveFailed(#[from] LinalgError),

    #[error("IRLS did not converge within {iterations} iterations (last relative deviance change: {last_change:.3e}).")]
    NotConverged { iterations: usize, last_change: f64 },

    #[error("No stratum has two or more PSUs with respondents; design-based variance cannot be estimated.")]
    NoVarianceInformation,

    #[error(transparent)]
    Frame(#[from] crate::survey::terms::FrameError),
}

#[derive(Debug, Clone)]
pub struct LogisticFit {
    pub coefficients: Coefficients,
    pub covariance: Array2<f64>,
    pub iterations: usize,
    pub deviance: f64,
    /// Strata skipped because they hold a single PSU.
    pub singleton_strata: usize,
}

impl LogisticFit {
    pub fn standard_errors(&self) -> Array1<f64> {
        self.covariance.diag().mapv(|v| v.max(0.0).sqrt())
    }
}

/// Working vectors of one IRLS step for the logit link: the fitted mean, the
/// working weights including the prior weights, and the working response.
pub fn update_glm_vectors(
    y: ArrayView1<f64>,
    eta: &LinearPredictor,
    prior_weights: ArrayView1<f64>,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    let eta_clamped = eta.mapv(|e| e.clamp(-700.0, 700.0));
    let mu = eta_clamped.mapv(|e| (1.0 / (1.0 + (-e).exp())).clamp(PROB_EPS, 1.0 - PROB_EPS));
    let variance = mu.mapv(|m| m * (1.0 - m));
    let z = &eta_clamped + &((&y - &mu) / &variance);
    let weights = (&prior_weights * &variance).mapv(|w| w.max(MIN_WEIGHT));
    (mu, weights, z)
}

/// Weighted Bernoulli deviance.
pub fn calculate_deviance(y: ArrayView1<f64>, mu: &Array1<f64>, prior_weights: ArrayView1<f64>) -> f64 {
    let total = Zip::from(y)
        .and(mu)
        .and(prior_weights)
        .fold(0.0, |acc, &yi, &mui, &wi| {
            let mui = mui.clamp(PROB_EPS, 1.0 - PROB_EPS);
            let term1 = if yi > 0.0 { yi * (yi.ln() - mui.ln()) } else { 0.0 };
            let term2 = if yi < 1.0 {
                (1.0 - yi) * ((1.0 - yi).ln() - (1.0 - mui).ln())
            } else {
                0.0
            };
            acc + wi * (term1 + term2)
        });
    2.0 * total
}

/// Ratio of the largest to the smallest singular value; infinite when the
/// matrix is numerically singular.
pub fn calculate_condition_number(matrix: &Array2<f64>) -> Result<f64, LinalgError> {
    let (_, s, _) = matrix.svd(false, false)?;
    let max_sv = s.iter().fold(0.0_f64, |max, &val| max.max(val));
    let min_sv = s.iter().fold(f64::INFINITY, |min, &val| min.min(val));
    if min_sv < 1e-12 {
        return Ok(f64::INFINITY);
    }
    Ok(max_sv / min_sv)
}

/// `X' diag(w) X`.
fn weighted_crossprod(x: ArrayView2<f64>, w: &Array1<f64>) -> Array2<f64> {
    let wx = &x * &w.view().insert_axis(Axis(1));
    x.t().dot(&wx)
}

fn check_conditioning(information: &Array2<f64>, options: &FitOptions) -> Result<(), FitError> {
    let condition = calculate_condition_number(information)?;
    if !condition.is_finite() || condition > options.max_condition {
        return Err(FitError::IllConditioned { condition });
    }
    Ok(())
}

/// Weights rescaled to mean one; the estimates do not depend on their scale.
fn normalise(weights: ArrayView1<f64>) -> Array1<f64> {
    let mean = weights.mean().unwrap_or(1.0);
    if mean > 0.0 {
        weights.mapv(|w| w / mean)
    } else {
        weights.to_owned()
    }
}

pub struct IrlsResult {
    pub coefficients: Coefficients,
    pub mu: Array1<f64>,
    pub deviance: f64,
    pub iterations: usize,
}

/// Weighted IRLS from a zero start.
pub fn fit_irls(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    weights: ArrayView1<f64>,
    options: &FitOptions,
) -> Result<IrlsResult, FitError> {
    if x.nrows() < options.min_rows {
        return Err(FitError::TooFewRows {
            found: x.nrows(),
            required: options.min_rows,
        });
    }
    let prior = normalise(weights);

    let mut beta = Coefficients::zeros(x.ncols());
    let mut eta = LinearPredictor::from(x.dot(&*beta));
    let (mut mu, mut working_weights, mut z) = update_glm_vectors(y, &eta, prior.view());
    let mut deviance = calculate_deviance(y, &mu, prior.view());

    check_conditioning(&weighted_crossprod(x, &working_weights), options)?;

    let mut last_change = f64::INFINITY;
    for iteration in 1..=options.max_iterations {
        let information = weighted_crossprod(x, &working_weights);
        let rhs = x.t().dot(&(&working_weights * &z));
        let proposal = information.solve(&rhs)?;

        // Step-halving towards the current estimate until the deviance does
        // not increase.
        let mut step = 1.0;
        let mut candidate = proposal.clone();
        let mut candidate_eta = LinearPredictor::from(x.dot(&candidate));
        let (mut candidate_mu, _, _) = update_glm_vectors(y, &candidate_eta, prior.view());
        let mut candidate_deviance = calculate_deviance(y, &candidate_mu, prior.view());
        let mut halvings = 0;
        while !(candidate_deviance.is_finite() && candidate_deviance <= deviance * (1.0 + 1e-12))
            && halvings < MAX_STEP_HALVINGS
        {
            step *= 0.5;
            halvings += 1;
            candidate = &*beta + &((&proposal - &*beta) * step);
            candidate_eta = LinearPredictor::from(x.dot(&candidate));
            candidate_mu = update_glm_vectors(y, &candidate_eta, prior.view()).0;
            candidate_deviance = calculate_deviance(y, &candidate_mu, prior.view());
        }

        last_change = (deviance - candidate_deviance).abs() / (candidate_deviance.abs() + 0.1);
        log::debug!(
            "IRLS iteration {iteration}: deviance {candidate_deviance:.6}, relative change {last_change:.3e}, step {step}"
        );

        beta = Coefficients::from(candidate);
        eta = candidate_eta;
        (mu, working_weights, z) = update_glm_vectors(y, &eta, prior.view());
        deviance = candidate_deviance;

        if last_change < options.tolerance {
            return Ok(IrlsResult {
                coefficients: beta,
                mu,
                deviance,
                iterations: iteration,
            });
        }
    }

    Err(FitError::NotConverged {
        iterations: options.max_iterations,
        last_change,
    })
}

/// Taylor-linearised covariance of the coefficients.
///
/// `rows` maps each analysed respondent to its table row so that its score
/// lands in the right PSU.
pub fn sandwich_covariance(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    mu: &Array1<f64>,
    weights: ArrayView1<f64>,
    rows: &[usize],
    design: &BoundDesign,
) -> Result<(Array2<f64>, usize), FitError> {
    let p = x.ncols();
    let prior = normalise(weights);

    let information = weighted_crossprod(x, &(&prior * &mu.mapv(|m| m * (1.0 - m))));
    let bread = information.inv()?;

    let mut psu_totals = Array2::<f64>::zeros((design.n_psu(), p));
    for (i, &row) in rows.iter().enumerate() {
        if let Some(k) = design.psu[row] {
            let score = &x.row(i) * (prior[i] * (y[i] - mu[i]));
            let mut total = psu_totals.row_mut(k);
            total += &score;
        }
    }

    let mut by_stratum: Vec<Vec<usize>> = vec![Vec::new(); design.n_strata];
    for (k, &h) in design.psu_stratum.iter().enumerate() {
        by_stratum[h].push(k);
    }

    let mut meat = Array2::<f64>::zeros((p, p));
    let mut singleton_strata = 0;
    let mut informative_strata = 0;
    for psus in &by_stratum {
        let n_h = psus.len();
        if n_h < 2 {
            singleton_strata += 1;
            continue;
        }
        informative_strata += 1;
        let mut mean = Array1::<f64>::zeros(p);
        for &k in psus {
            mean += &psu_totals.row(k);
        }
        mean /= n_h as f64;

        let factor = n_h as f64 / (n_h as f64 - 1.0);
        for &k in psus {
            let deviation = &psu_totals.row(k) - &mean;
            let column = deviation.view().insert_axis(Axis(1));
            let outer = column.dot(&column.t());
            meat.scaled_add(factor, &outer);
        }
    }

    if informative_strata == 0 {
        return Err(FitError::NoVarianceInformation);
    }
    if singleton_strata > 0 {
        log::warn!(
            "{singleton_strata} stratum/strata hold a single PSU and contribute no variance."
        );
    }

    let covariance = bread.dot(&meat).dot(&bread);
    Ok((covariance, singleton_strata))
}

/// Fits the model and its design-based covariance.
pub fn fit_survey_logistic(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    weights: ArrayView1<f64>,
    rows: &[usize],
    design: &BoundDesign,
    options: &FitOptions,
) -> Result<LogisticFit, FitError> {
    let irls = fit_irls(x, y, weights, options)?;

    let prior = normalise(weights);
    let final_information = weighted_crossprod(x, &(&prior * &irls.mu.mapv(|m| m * (1.0 - m))));
    check_conditioning(&final_information, options)?;

    let (covariance, singleton_strata) =
        sandwich_covariance(x, y, &irls.mu, weights, rows, design)?;

    Ok(LogisticFit {
        coefficients: irls.coefficients,
        covariance,
        iterations: irls.iterations,
        deviance: irls.deviance,
        singleton_strata,
    })
}
