//! Stats module - panel extraction and aggregate statistics

mod calculator;

pub use calculator::{
    classify, continent_stats, country_stats, linear_fit, quantile_breaks, weighted_mean,
    year_series, LinearFit, StatsError, CONFIDENCE_LEVEL,
};
