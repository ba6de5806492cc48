//! Statistics Calculator Module
//! Extracts country and continent series from the panel, plus the small
//! statistical helpers the charts need (regression fits, quantile classes).

use crate::data::{CONTINENT_CODE, COUNTRY_CODE, POPULATION, YEAR};
use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Confidence level of the regression band.
pub const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("No rows with {metric} and Population for continent {code}")]
    EmptyContinent { code: String, metric: String },
}

/// Fetch the yearly rows of one country.
///
/// Rows are sorted ascending by year and `year` becomes the first column.
/// An unknown code yields an empty frame.
pub fn country_stats(code: &str, panel: &DataFrame) -> Result<DataFrame, StatsError> {
    let mut order = vec![col(YEAR)];
    order.extend(
        panel
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != YEAR)
            .map(|name| col(name.clone())),
    );

    let df = panel
        .clone()
        .lazy()
        .filter(col(COUNTRY_CODE).eq(lit(code)))
        .sort([YEAR], SortMultipleOptions::default())
        .select(order)
        .collect()?;

    debug!("country_stats({}): {} rows", code, df.height());
    Ok(df)
}

/// Population-weighted yearly mean of `metric` over one continent.
///
/// Rows missing `metric` or `Population` are dropped first. Output columns:
/// `year`, `<metric>`.
pub fn continent_stats(
    code: &str,
    panel: &DataFrame,
    metric: &str,
) -> Result<DataFrame, StatsError> {
    let df = panel
        .clone()
        .lazy()
        .filter(col(CONTINENT_CODE).eq(lit(code)))
        .select([
            col(YEAR).cast(DataType::Int32),
            col(metric).cast(DataType::Float64),
            col(POPULATION).cast(DataType::Float64),
        ])
        .collect()?;

    let years = df.column(YEAR)?.i32()?;
    let values = df.column(metric)?.f64()?;
    let weights = df.column(POPULATION)?.f64()?;

    // year -> (values, weights)
    let mut groups: BTreeMap<i32, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for i in 0..df.height() {
        if let (Some(year), Some(v), Some(w)) = (years.get(i), values.get(i), weights.get(i)) {
            if !v.is_nan() && !w.is_nan() {
                let group = groups.entry(year).or_default();
                group.0.push(v);
                group.1.push(w);
            }
        }
    }

    if groups.is_empty() {
        return Err(StatsError::EmptyContinent {
            code: code.to_string(),
            metric: metric.to_string(),
        });
    }

    let mut out_years: Vec<i32> = Vec::with_capacity(groups.len());
    let mut out_values: Vec<Option<f64>> = Vec::with_capacity(groups.len());
    for (year, (v, w)) in &groups {
        out_years.push(*year);
        out_values.push(weighted_mean(v, w));
    }

    let result = DataFrame::new(vec![
        Column::new(YEAR.into(), out_years),
        Column::new(metric.into(), out_values),
    ])?;

    debug!(
        "continent_stats({}, {}): {} years from {} rows",
        code,
        metric,
        result.height(),
        df.height()
    );
    Ok(result)
}

/// `sum(value * weight) / sum(weight)`, `None` for empty input or zero weight.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    if values.is_empty() || values.len() != weights.len() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return None;
    }
    let weighted: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Some(weighted / total)
}

/// Non-null (year, value) points of a metric column, in frame order.
pub fn year_series(frame: &DataFrame, metric: &str) -> Result<Vec<(i32, f64)>, StatsError> {
    let years = frame.column(YEAR)?.cast(&DataType::Int32)?;
    let values = frame.column(metric)?.cast(&DataType::Float64)?;

    let points = years
        .i32()?
        .into_iter()
        .zip(values.f64()?.into_iter())
        .filter_map(|pair| match pair {
            (Some(year), Some(value)) if !value.is_nan() => Some((year, value)),
            _ => None,
        })
        .collect();

    Ok(points)
}

/// Ordinary least squares fit of `y = slope * x + intercept`.
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub count: usize,
    x_mean: f64,
    /// Sum of squared deviations of x.
    sxx: f64,
    residual_std: f64,
    /// Two-sided Student t quantile, absent below three points.
    t_crit: Option<f64>,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Confidence band of the fitted mean at `x`.
    pub fn band(&self, x: f64) -> Option<(f64, f64)> {
        let t = self.t_crit?;
        let se = self.residual_std
            * (1.0 / self.count as f64 + (x - self.x_mean).powi(2) / self.sxx).sqrt();
        let y = self.predict(x);
        Some((y - t * se, y + t * se))
    }
}

/// Fit a regression line through paired samples.
///
/// Returns `None` with fewer than two points or when x has no spread.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return None;
    }

    let x_mean = xs.iter().mean();
    let y_mean = ys.iter().mean();
    let x_var = xs.iter().variance();
    if x_var.is_nan() || x_var <= 0.0 {
        return None;
    }

    let slope = xs.iter().covariance(ys.iter()) / x_var;
    let intercept = y_mean - slope * x_mean;
    let sxx = x_var * (n - 1) as f64;

    let (residual_std, t_crit) = if n > 2 {
        let dof = (n - 2) as f64;
        let rss: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum();
        let t = StudentsT::new(0.0, 1.0, dof)
            .ok()
            .map(|dist| dist.inverse_cdf(0.5 + CONFIDENCE_LEVEL / 2.0));
        ((rss / dof).sqrt(), t)
    } else {
        (0.0, None)
    };

    Some(LinearFit {
        slope,
        intercept,
        count: n,
        x_mean,
        sxx,
        residual_std,
        t_crit,
    })
}

/// Upper bounds of `k` quantile classes over the non-NaN values.
pub fn quantile_breaks(values: &[f64], k: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() || k == 0 {
        return Vec::new();
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    (1..=k)
        .map(|i| percentile(&sorted, 100.0 * i as f64 / k as f64))
        .collect()
}

/// Index of the first class whose upper bound is not below `value`.
pub fn classify(value: f64, breaks: &[f64]) -> Option<usize> {
    if breaks.is_empty() || value.is_nan() {
        return None;
    }
    Some(
        breaks
            .iter()
            .position(|upper| value <= *upper)
            .unwrap_or(breaks.len() - 1),
    )
}

/// Calculate percentile using linear interpolation (NumPy compatible).
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_values[0];
    }

    let rank = (p / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(n - 1);
    let frac = rank - lower as f64;

    if lower == upper {
        sorted_values[lower]
    } else {
        sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
    }
}
