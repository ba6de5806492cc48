//! Choropleth Map Renderer
//! Colours world regions by quantile class of a statistic for one year.
//!
//! Layout:
//! 1. Title: "{response} in {year}" centered
//! 2. Regions in equirectangular lon/lat, light grey edges, no axes
//! 3. Legend in the lower left: one box per class plus "No Data"

use super::plotter::lerp_color;
use super::{ChartError, Figure, GeoShapes, PlotSurface};
use crate::config::ChartConfig;
use crate::data::{COUNTRY_CODE, YEAR};
use crate::stats::{classify, quantile_breaks};
use plotters::prelude::*;
use polars::prelude::{col, lit, DataFrame, DataType, IntoLazy};
use std::collections::HashMap;
use tracing::info;

/// Lightest and darkest colours of the "Greens" ramp.
const GREENS_LIGHT: RGBColor = RGBColor(229, 245, 224);
const GREENS_DARK: RGBColor = RGBColor(0, 109, 44);
/// Regions without a value.
const NO_DATA: RGBColor = RGBColor(211, 211, 211);
/// Region outlines (grey 0.8).
const EDGE: RGBColor = RGBColor(204, 204, 204);

pub const NO_DATA_LABEL: &str = "No Data";

/// Quantile classes of one map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapClasses {
    /// Upper bound of each class.
    pub breaks: Vec<f64>,
    /// Smallest classified value, the lower bound of the first class.
    pub min: f64,
}

impl MapClasses {
    pub fn from_values(values: &[f64], k: usize) -> Self {
        let min = values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::INFINITY, f64::min);
        Self {
            breaks: quantile_breaks(values, k),
            min,
        }
    }

    /// Fill colour for a region value; missing values are grey.
    pub fn color(&self, value: Option<f64>) -> RGBColor {
        match value.and_then(|v| classify(v, &self.breaks)) {
            Some(class) => MapRenderer::class_color(class, self.breaks.len()),
            None => NO_DATA,
        }
    }

    /// Legend labels `"{lower:.1}, {upper:.1}"`, one per class.
    pub fn legend_labels(&self) -> Vec<String> {
        self.breaks
            .iter()
            .enumerate()
            .map(|(i, upper)| {
                let lower = if i == 0 { self.min } else { self.breaks[i - 1] };
                format!("{:.1}, {:.1}", lower, upper)
            })
            .collect()
    }
}

pub struct MapRenderer;

impl MapRenderer {
    /// Colour of `class` out of `classes` along the Greens ramp.
    pub fn class_color(class: usize, classes: usize) -> RGBColor {
        let t = if classes > 1 {
            class as f64 / (classes - 1) as f64
        } else {
            0.5
        };
        lerp_color(GREENS_LIGHT, GREENS_DARK, t)
    }

    /// `country_code -> value` of `response` for one year, dropping missing values.
    pub fn year_values(
        world: &DataFrame,
        year: i32,
        response: &str,
    ) -> Result<HashMap<String, f64>, ChartError> {
        let df = world
            .clone()
            .lazy()
            .filter(col(YEAR).cast(DataType::Int32).eq(lit(year)))
            .select([
                col(COUNTRY_CODE).cast(DataType::String),
                col(response).cast(DataType::Float64),
            ])
            .collect()?;

        let codes = df.column(COUNTRY_CODE)?.str()?;
        let values = df.column(response)?.f64()?;

        Ok(codes
            .into_iter()
            .zip(values.into_iter())
            .filter_map(|pair| match pair {
                (Some(code), Some(value)) if !value.is_nan() => Some((code.to_string(), value)),
                _ => None,
            })
            .collect())
    }

    /// World map of `response` in `year`, regions binned into `k` quantile classes.
    pub fn plot_world_map(
        world: &DataFrame,
        shapes: &GeoShapes,
        year: i32,
        response: &str,
        k: usize,
        config: &ChartConfig,
        surface: &mut PlotSurface,
    ) -> Result<(), ChartError> {
        let values = Self::year_values(world, year, response)?;
        let observed: Vec<f64> = values.values().copied().collect();
        let classes = MapClasses::from_values(&observed, k);

        let title = format!("{} in {}", response, year);
        let font = config.font_family.as_str();
        let mut missing = 0;

        let figure = Figure::render(&title, config.map_size, |root| {
            let mut chart = ChartBuilder::on(root)
                .margin(20)
                .caption(&title, (font, config.caption_size * 1.5))
                .build_cartesian_2d(-180.0..180.0, -90.0..90.0)?;

            for (code, rings) in shapes.iter() {
                let value = values.get(code).copied();
                if value.is_none() {
                    missing += 1;
                }
                let fill = classes.color(value);

                chart.draw_series(
                    rings
                        .iter()
                        .map(|ring| Polygon::new(ring.clone(), fill.filled())),
                )?;
                chart.draw_series(rings.iter().map(|ring| {
                    let mut outline = ring.clone();
                    if let Some(first) = ring.first() {
                        outline.push(*first);
                    }
                    PathElement::new(outline, &EDGE)
                }))?;
            }

            for (i, label) in classes.legend_labels().into_iter().enumerate() {
                let color = Self::class_color(i, classes.breaks.len());
                chart
                    .draw_series(std::iter::empty::<Circle<(f64, f64), i32>>())?
                    .label(label)
                    .legend(move |(x, y)| {
                        Rectangle::new([(x, y - 6), (x + 12, y + 6)], color.filled())
                    });
            }
            if missing > 0 {
                chart
                    .draw_series(std::iter::empty::<Circle<(f64, f64), i32>>())?
                    .label(NO_DATA_LABEL)
                    .legend(|(x, y)| {
                        Rectangle::new([(x, y - 6), (x + 12, y + 6)], NO_DATA.filled())
                    });
            }

            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::LowerLeft)
                .background_style(&WHITE.mix(0.8))
                .border_style(&EDGE)
                .label_font((font, config.label_size * 1.5))
                .draw()?;

            Ok(())
        })?;

        surface.show(figure)?;
        info!(
            "Map '{}' rendered: {} regions, {} without data, {} classes",
            title,
            shapes.len(),
            missing,
            classes.breaks.len()
        );
        Ok(())
    }
}
