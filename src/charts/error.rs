//! Chart Error Module

use crate::stats::StatsError;
use image::ImageError;
use plotters::drawing::DrawingAreaErrorKind;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Stats error: {0}")]
    StatsError(#[from] StatsError),
    #[error("Drawing error: {0}")]
    Drawing(String),
    #[error("Failed to save figure: {0}")]
    Image(#[from] ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Code {0} is neither a country nor a continent code")]
    UnknownCode(String),
    #[error("Pixel buffer does not match a {0}x{1} figure")]
    BufferSize(u32, u32),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Drawing(err.to_string())
    }
}
