//! Country Panel - indicator joins, continental aggregates & static charts
//!
//! Helper routines for exploring per-country yearly indicators: wide tables
//! are joined into one long country-year panel, single-country or
//! population-weighted continental series are extracted from it, and the
//! results are rendered as static chart images.

pub mod charts;
pub mod config;
pub mod data;
pub mod stats;

pub use charts::{Backend, ChartError, ChartPlotter, Figure, GeoShapes, MapRenderer, PlotSurface};
pub use config::ChartConfig;
pub use data::{
    code_to_country, country_to_code, join_data, CodeMap, IndicatorTable, ProcessorError,
};
pub use stats::{continent_stats, country_stats, StatsError};
