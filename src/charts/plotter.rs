//! Chart Plotter Module
//! Bar, dual-axis line and multi-predictor regression charts drawn with plotters.

use super::{ChartError, Figure, PlotSurface};
use crate::config::ChartConfig;
use crate::data::{CodeMap, COUNTRY_NAME};
use crate::stats::{continent_stats, country_stats, linear_fit, year_series};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::{DataFrame, DataType};
use std::ops::Range;
use tracing::info;

/// Notice emitted instead of a bar chart for empty input.
pub const EMPTY_DATASET_NOTICE: &str = "The dataset is empty!";

/// Columns of the multi-predictor grid.
pub const GRID_COLUMNS: usize = 3;

/// Darkest bar colour (seaborn "seagreen").
const SEAGREEN: RGBColor = RGBColor(46, 139, 87);
/// Lightest bar colour of the seagreen light palette.
const SEAGREEN_LIGHT: RGBColor = RGBColor(222, 236, 228);

const FIRST_METRIC_COLOR: RGBColor = RED;
const SECOND_METRIC_COLOR: RGBColor = BLUE;
const SCATTER_COLOR: RGBColor = RGBColor(31, 119, 180);

/// The two series of a dual-metric chart and the name of the area they describe.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaSeries {
    pub name: String,
    pub first: Vec<(i32, f64)>,
    pub second: Vec<(i32, f64)>,
}

/// Creates static charts from panel data.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Colour of the bar in `row` out of `rows`; the first row is darkest.
    pub fn bar_color(row: usize, rows: usize) -> RGBColor {
        let t = if rows > 1 {
            row as f64 / (rows - 1) as f64
        } else {
            0.0
        };
        lerp_color(SEAGREEN, SEAGREEN_LIGHT, t)
    }

    /// Horizontal bar chart of `stat` per country, in the row order given.
    ///
    /// Bars are labelled from the `country_name` column. Empty input emits a
    /// notice on the surface instead of a figure.
    pub fn plot_country_bars(
        data: &DataFrame,
        year: i32,
        stat: &str,
        config: &ChartConfig,
        surface: &mut PlotSurface,
    ) -> Result<(), ChartError> {
        if data.height() == 0 || data.width() == 0 {
            surface.notify(EMPTY_DATASET_NOTICE);
            return Ok(());
        }

        let names = data.column(COUNTRY_NAME)?.cast(&DataType::String)?;
        let values = data.column(stat)?.cast(&DataType::Float64)?;
        let bars: Vec<(String, Option<f64>)> = names
            .str()?
            .into_iter()
            .zip(values.f64()?.into_iter())
            .map(|(name, value)| {
                (
                    name.unwrap_or_default().to_string(),
                    value.filter(|v| !v.is_nan()),
                )
            })
            .collect();

        let rows = bars.len();
        let (x_range, label_offset) = bar_axis(bars.iter().filter_map(|(_, v)| *v));

        let title = format!("{} in {}", stat, year);
        let font = config.font_family.as_str();
        let size = (config.bar_width, config.bar_height(rows));

        let figure = Figure::render(&title, size, |root| {
            let mut chart = ChartBuilder::on(root)
                .margin(15)
                .caption(&title, (font, config.caption_size))
                .x_label_area_size(50)
                .y_label_area_size(160)
                .build_cartesian_2d(x_range, (0..rows).into_segmented())?;

            // Segment 0 is at the bottom, so the first row maps to the top slot
            let slot = |row: usize| rows - 1 - row;

            chart
                .configure_mesh()
                .disable_y_mesh()
                .x_desc(title.as_str())
                .y_desc("Country")
                .y_labels(rows)
                .y_label_formatter(&|v: &SegmentValue<usize>| match v {
                    SegmentValue::CenterOf(i) if *i < rows => bars[slot(*i)].0.clone(),
                    _ => String::new(),
                })
                .label_style((font, config.label_size))
                .draw()?;

            chart.draw_series(bars.iter().enumerate().filter_map(|(row, (_, value))| {
                let value = (*value)?;
                let mut bar = Rectangle::new(
                    [
                        (value.min(0.0), SegmentValue::Exact(slot(row))),
                        (value.max(0.0), SegmentValue::Exact(slot(row) + 1)),
                    ],
                    Self::bar_color(row, rows).filled(),
                );
                bar.set_margin(2, 2, 0, 0);
                Some(bar)
            }))?;

            // Labels sit past the bar end, on the side the bar grows towards
            chart.draw_series(bars.iter().enumerate().filter_map(|(row, (_, value))| {
                let value = (*value)?;
                let (x, anchor) = if value < 0.0 {
                    (value - label_offset, HPos::Right)
                } else {
                    (value + label_offset, HPos::Left)
                };
                let style = TextStyle::from((font, config.label_size).into_font())
                    .pos(Pos::new(anchor, VPos::Center));
                Some(Text::new(
                    format!("{:.2}", value),
                    (x, SegmentValue::CenterOf(slot(row))),
                    style,
                ))
            }))?;

            Ok(())
        })?;

        surface.show(figure)?;
        info!("Bar chart '{}' rendered with {} bars", title, rows);
        Ok(())
    }

    /// Resolve `code` to its series: country codes take precedence over
    /// continent codes.
    pub fn resolve_area(
        panel: &DataFrame,
        code: &str,
        metrics: [&str; 2],
        code_maps: [&CodeMap; 2],
    ) -> Result<AreaSeries, ChartError> {
        let [countries, continents] = code_maps;

        if let Some(name) = countries.get(code) {
            let frame = country_stats(code, panel)?;
            return Ok(AreaSeries {
                name: name.clone(),
                first: year_series(&frame, metrics[0])?,
                second: year_series(&frame, metrics[1])?,
            });
        }

        if let Some(name) = continents.get(code) {
            let first = continent_stats(code, panel, metrics[0])?;
            let second = continent_stats(code, panel, metrics[1])?;
            return Ok(AreaSeries {
                name: name.clone(),
                first: year_series(&first, metrics[0])?,
                second: year_series(&second, metrics[1])?,
            });
        }

        Err(ChartError::UnknownCode(code.to_string()))
    }

    pub fn area_title(metrics: [&str; 2], name: &str, years: (i32, i32)) -> String {
        format!(
            "{} and {} in {} in {}-{}",
            metrics[0], metrics[1], name, years.0, years.1
        )
    }

    /// Two metrics of one country or continent over time, each on its own y axis.
    pub fn plot_area(
        panel: &DataFrame,
        code: &str,
        metrics: [&str; 2],
        code_maps: [&CodeMap; 2],
        years: (i32, i32),
        config: &ChartConfig,
        surface: &mut PlotSurface,
    ) -> Result<(), ChartError> {
        let area = Self::resolve_area(panel, code, metrics, code_maps)?;
        let title = Self::area_title(metrics, &area.name, years);
        let font = config.font_family.as_str();

        let x_range = years.0..years.1.max(years.0 + 1);
        let first_range = value_range(area.first.iter().map(|(_, v)| *v));
        let second_range = value_range(area.second.iter().map(|(_, v)| *v));

        let figure = Figure::render(&title, config.line_size, |root| {
            let mut chart = ChartBuilder::on(root)
                .margin(15)
                .caption(&title, (font, config.caption_size))
                .x_label_area_size(45)
                .y_label_area_size(70)
                .right_y_label_area_size(70)
                .build_cartesian_2d(x_range.clone(), first_range)?
                .set_secondary_coord(x_range, second_range);

            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("Year")
                .y_desc(metrics[0])
                .label_style((font, config.label_size))
                .draw()?;
            chart
                .configure_secondary_axes()
                .y_desc(metrics[1])
                .label_style((font, config.label_size))
                .draw()?;

            chart
                .draw_series(LineSeries::new(
                    area.first.iter().copied(),
                    FIRST_METRIC_COLOR.stroke_width(2),
                ))?
                .label(metrics[0])
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], &FIRST_METRIC_COLOR)
                });
            chart
                .draw_secondary_series(LineSeries::new(
                    area.second.iter().copied(),
                    SECOND_METRIC_COLOR.stroke_width(2),
                ))?
                .label(metrics[1])
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], &SECOND_METRIC_COLOR)
                });

            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::LowerLeft)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .label_font((font, config.label_size))
                .draw()?;

            Ok(())
        })?;

        surface.show(figure)?;
        info!("Line chart '{}' rendered", title);
        Ok(())
    }

    /// (rows, columns) of the grid for `count` predictors.
    pub fn grid_shape(count: usize) -> (usize, usize) {
        (count / GRID_COLUMNS + 1, GRID_COLUMNS)
    }

    /// Grid position of the subplot for predictor `index`.
    pub fn grid_position(index: usize) -> (usize, usize) {
        (index / GRID_COLUMNS, index % GRID_COLUMNS)
    }

    /// Trailing cells of the last row left without a subplot.
    pub fn hidden_cells(count: usize) -> Vec<(usize, usize)> {
        let last_row = count / GRID_COLUMNS;
        (count % GRID_COLUMNS..GRID_COLUMNS)
            .map(|col| (last_row, col))
            .collect()
    }

    /// One scatter plot with a fitted regression line per predictor.
    pub fn plot_multi_predictors(
        data: &DataFrame,
        response: &str,
        predictors: &[&str],
        config: &ChartConfig,
        surface: &mut PlotSurface,
    ) -> Result<(), ChartError> {
        let (rows, cols) = Self::grid_shape(predictors.len());
        let (cell_w, cell_h) = config.grid_cell_size;
        let size = (cell_w * cols as u32, cell_h * rows as u32);
        let font = config.font_family.as_str();

        let pairs = predictors
            .iter()
            .map(|predictor| paired_values(data, predictor, response))
            .collect::<Result<Vec<_>, _>>()?;

        let title = format!("{} vs {} predictors", response, predictors.len());
        let figure = Figure::render(&title, size, |root| {
            let cells = root.split_evenly((rows, cols));

            for (i, (predictor, (xs, ys))) in predictors.iter().zip(&pairs).enumerate() {
                let (row, col) = Self::grid_position(i);
                let cell = &cells[row * cols + col];

                let x_range = value_range(xs.iter().copied());
                let y_range = value_range(ys.iter().copied());

                let mut chart = ChartBuilder::on(cell)
                    .margin(20)
                    .x_label_area_size(45)
                    .y_label_area_size(60)
                    .build_cartesian_2d(x_range.clone(), y_range)?;

                chart
                    .configure_mesh()
                    .x_desc(*predictor)
                    .y_desc(response)
                    .label_style((font, config.label_size))
                    .draw()?;

                if let Some(fit) = linear_fit(xs, ys) {
                    let steps = 50;
                    let span = x_range.end - x_range.start;
                    let grid: Vec<f64> = (0..=steps)
                        .map(|s| x_range.start + span * s as f64 / steps as f64)
                        .collect();

                    let bands: Vec<(f64, (f64, f64))> = grid
                        .iter()
                        .filter_map(|&x| fit.band(x).map(|band| (x, band)))
                        .collect();
                    if !bands.is_empty() {
                        let outline: Vec<(f64, f64)> = bands
                            .iter()
                            .map(|&(x, (_, hi))| (x, hi))
                            .chain(bands.iter().rev().map(|&(x, (lo, _))| (x, lo)))
                            .collect();
                        chart.draw_series(std::iter::once(Polygon::new(
                            outline,
                            SCATTER_COLOR.mix(0.15).filled(),
                        )))?;
                    }

                    chart.draw_series(std::iter::once(PathElement::new(
                        grid.iter().map(|&x| (x, fit.predict(x))).collect::<Vec<_>>(),
                        SCATTER_COLOR.stroke_width(2),
                    )))?;
                }

                chart.draw_series(
                    xs.iter()
                        .zip(ys)
                        .map(|(&x, &y)| Circle::new((x, y), 2, SCATTER_COLOR.filled())),
                )?;
            }

            // Cells listed by hidden_cells stay blank
            Ok(())
        })?;

        surface.show(figure)?;
        info!(
            "Predictor grid for '{}' rendered: {} subplots, {} hidden cells",
            response,
            predictors.len(),
            Self::hidden_cells(predictors.len()).len()
        );
        Ok(())
    }
}

/// Rows where both columns are present, as parallel (x, y) vectors.
fn paired_values(
    data: &DataFrame,
    x_col: &str,
    y_col: &str,
) -> Result<(Vec<f64>, Vec<f64>), ChartError> {
    let xs = data.column(x_col)?.cast(&DataType::Float64)?;
    let ys = data.column(y_col)?.cast(&DataType::Float64)?;

    let (xs, ys) = xs
        .f64()?
        .into_iter()
        .zip(ys.f64()?.into_iter())
        .filter_map(|pair| match pair {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        })
        .unzip();

    Ok((xs, ys))
}

/// X axis of a bar chart and the label offset from each bar end.
///
/// The axis always contains 0 and is padded by 15% of the largest absolute
/// value on each side that holds bars.
pub(crate) fn bar_axis(values: impl Iterator<Item = f64>) -> (Range<f64>, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let extent = min.abs().max(max.abs());
    if extent == 0.0 {
        return (0.0..1.0, 0.0);
    }

    let pad = extent * 0.15;
    let start = if min < 0.0 { min - pad } else { 0.0 };
    let end = if max > 0.0 { max + pad } else { 0.0 };
    (start..end, 0.01 * extent)
}

/// Axis range covering `values` with 5% padding; `0..1` when empty.
pub(crate) fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if min > max {
        return 0.0..1.0;
    }
    if min == max {
        let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.1 };
        return (min - pad)..(max + pad);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

pub(crate) fn lerp_color(from: RGBColor, to: RGBColor, t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use polars::prelude::*;

    fn code_maps() -> (CodeMap, CodeMap) {
        let countries: CodeMap = [("DEU", "Germany"), ("FRA", "France")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let continents: CodeMap = [("EU", "Europe")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (countries, continents)
    }

    fn panel() -> Result<DataFrame> {
        Ok(df!(
            "country_code" => ["DEU", "DEU", "FRA", "FRA"],
            "year" => [2001i32, 2000, 2000, 2001],
            "continent_code" => ["EU", "EU", "EU", "EU"],
            "Population" => [8.0, 8.0, 2.0, 2.0],
            "GDP" => [21.0, 20.0, 10.0, 11.0],
            "CO2" => [Some(1.0), Some(2.0), Some(3.0), None]
        )?)
    }

    fn count_pixels(figure: &Figure, color: RGBColor) -> usize {
        figure
            .image
            .pixels()
            .filter(|p| p.0 == [color.0, color.1, color.2])
            .count()
    }

    #[test]
    fn test_empty_bar_chart_emits_notice() -> Result<()> {
        let empty = df!(
            "country_name" => Vec::<String>::new(),
            "GDP" => Vec::<f64>::new()
        )?;
        let mut surface = PlotSurface::default();

        let config = ChartConfig::default();
        ChartPlotter::plot_country_bars(&empty, 2000, "GDP", &config, &mut surface)?;

        assert!(surface.figures().is_empty());
        assert_eq!(surface.notices(), [EMPTY_DATASET_NOTICE.to_string()]);
        Ok(())
    }

    #[test]
    fn test_bar_chart_draws_negative_bars() -> Result<()> {
        let data = df!(
            "country_name" => ["A", "B"],
            "Growth" => [-5.0, 3.0]
        )?;
        let config = ChartConfig::default();
        let mut surface = PlotSurface::default();

        ChartPlotter::plot_country_bars(&data, 2000, "Growth", &config, &mut surface)?;

        assert_eq!(surface.figures().len(), 1);
        let figure = &surface.figures()[0];
        assert_eq!(figure.title, "Growth in 2000");
        assert_eq!(
            (figure.width(), figure.height()),
            (config.bar_width, config.bar_height(2))
        );

        let negative = count_pixels(figure, ChartPlotter::bar_color(0, 2));
        let positive = count_pixels(figure, ChartPlotter::bar_color(1, 2));
        assert!(positive > 0);
        assert!(negative > positive, "the -5 bar is longer than the 3 bar");
        Ok(())
    }

    #[test]
    fn test_bar_axis_spans_zero() {
        let (range, offset) = bar_axis([-5.0, 3.0].into_iter());
        assert!(range.start < -5.0 && range.end > 3.0);
        assert!((offset - 0.05).abs() < 1e-12);

        let (range, offset) = bar_axis([-2.0, -4.0].into_iter());
        assert!(range.start < -4.0);
        assert_eq!(range.end, 0.0);
        assert!(offset > 0.0);

        let (range, _) = bar_axis([2.0, 4.0].into_iter());
        assert_eq!(range.start, 0.0);
        assert_eq!(bar_axis([0.0].into_iter()), (0.0..1.0, 0.0));
    }

    #[test]
    fn test_bar_palette_darkest_first() {
        assert_eq!(ChartPlotter::bar_color(0, 5), SEAGREEN);
        assert_eq!(ChartPlotter::bar_color(4, 5), SEAGREEN_LIGHT);
        assert_eq!(ChartPlotter::bar_color(0, 1), SEAGREEN);
    }

    #[test]
    fn test_resolve_country_before_continent() -> Result<()> {
        let (countries, mut continents) = code_maps();
        continents.insert("DEU".to_string(), "Not a continent".to_string());

        let area = ChartPlotter::resolve_area(
            &panel()?,
            "DEU",
            ["GDP", "CO2"],
            [&countries, &continents],
        )?;
        assert_eq!(area.name, "Germany");
        assert_eq!(area.first, vec![(2000, 20.0), (2001, 21.0)]);
        assert_eq!(area.second, vec![(2000, 2.0), (2001, 1.0)]);
        Ok(())
    }

    #[test]
    fn test_resolve_continent() -> Result<()> {
        let (countries, continents) = code_maps();
        let area = ChartPlotter::resolve_area(
            &panel()?,
            "EU",
            ["GDP", "CO2"],
            [&countries, &continents],
        )?;
        assert_eq!(area.name, "Europe");
        assert_eq!(area.first, vec![(2000, 18.0), (2001, 19.0)]);
        // FRA has no CO2 in 2001, so DEU alone remains
        assert_eq!(area.second[1], (2001, 1.0));
        Ok(())
    }

    #[test]
    fn test_resolve_unknown_code() -> Result<()> {
        let (countries, continents) = code_maps();
        let result = ChartPlotter::resolve_area(
            &panel()?,
            "XX",
            ["GDP", "CO2"],
            [&countries, &continents],
        );
        assert!(matches!(result, Err(ChartError::UnknownCode(code)) if code == "XX"));
        Ok(())
    }

    #[test]
    fn test_plot_area_draws_both_metrics() -> Result<()> {
        let (countries, continents) = code_maps();
        let config = ChartConfig::default();
        let mut surface = PlotSurface::default();

        ChartPlotter::plot_area(
            &panel()?,
            "EU",
            ["GDP", "CO2"],
            [&countries, &continents],
            (2000, 2001),
            &config,
            &mut surface,
        )?;

        assert_eq!(surface.figures().len(), 1);
        let figure = &surface.figures()[0];
        assert_eq!(figure.title, "GDP and CO2 in Europe in 2000-2001");
        assert_eq!((figure.width(), figure.height()), config.line_size);
        assert!(count_pixels(figure, FIRST_METRIC_COLOR) > 0);
        assert!(count_pixels(figure, SECOND_METRIC_COLOR) > 0);
        Ok(())
    }

    #[test]
    fn test_plot_area_single_year() -> Result<()> {
        let (countries, continents) = code_maps();
        let mut surface = PlotSurface::default();

        ChartPlotter::plot_area(
            &panel()?,
            "FRA",
            ["GDP", "CO2"],
            [&countries, &continents],
            (2000, 2000),
            &ChartConfig::default(),
            &mut surface,
        )?;

        assert_eq!(surface.figures().len(), 1);
        Ok(())
    }

    #[test]
    fn test_plot_multi_predictors_grid() -> Result<()> {
        let config = ChartConfig::default();
        let mut surface = PlotSurface::default();

        ChartPlotter::plot_multi_predictors(
            &panel()?,
            "GDP",
            &["CO2", "Population"],
            &config,
            &mut surface,
        )?;

        assert_eq!(surface.figures().len(), 1);
        let figure = &surface.figures()[0];
        let (cell_w, cell_h) = config.grid_cell_size;
        assert_eq!((figure.width(), figure.height()), (cell_w * 3, cell_h));
        assert!(count_pixels(figure, SCATTER_COLOR) > 0);

        // Third cell of the only row has no subplot
        let center = figure.image.get_pixel(cell_w * 2 + cell_w / 2, cell_h / 2);
        assert_eq!(center.0, [255, 255, 255]);
        Ok(())
    }

    #[test]
    fn test_area_title() {
        assert_eq!(
            ChartPlotter::area_title(["GDP", "CO2"], "Europe", (1990, 2015)),
            "GDP and CO2 in Europe in 1990-2015"
        );
    }

    #[test]
    fn test_grid_layout() {
        assert_eq!(ChartPlotter::grid_shape(4), (2, 3));
        assert_eq!(ChartPlotter::grid_position(4), (1, 1));
        assert_eq!(ChartPlotter::hidden_cells(4), vec![(1, 1), (1, 2)]);
        // A full last row still leaves an empty row below it
        assert_eq!(ChartPlotter::grid_shape(3), (2, 3));
        assert_eq!(ChartPlotter::hidden_cells(3), vec![(1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_paired_values_skip_missing() -> Result<()> {
        let (xs, ys) = paired_values(&panel()?, "CO2", "GDP")?;
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(ys, vec![21.0, 20.0, 10.0]);
        Ok(())
    }

    #[test]
    fn test_value_range() {
        assert_eq!(value_range(std::iter::empty()), 0.0..1.0);
        let range = value_range([0.0, 10.0].into_iter());
        assert!(range.start < 0.0 && range.end > 10.0);
        let flat = value_range([5.0].into_iter());
        assert!(flat.start < 5.0 && flat.end > 5.0);
    }
}
