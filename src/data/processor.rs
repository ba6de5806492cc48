//! Panel Joiner Module
//! Merges wide per-country indicator tables into a long country-year panel.

use super::{COUNTRY_CODE, YEAR};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Invalid year range: {start} > {end}")]
    InvalidYearRange { start: i32, end: i32 },
    #[error("Indicator name '{0}' collides with a panel key column")]
    ReservedName(String),
}

/// A named wide-format table: one row per country, one column per year.
#[derive(Debug, Clone)]
pub struct IndicatorTable {
    pub name: String,
    pub frame: DataFrame,
}

impl IndicatorTable {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }
}

type PanelKey = (String, i32);

/// All values of one indicator, keyed by (country, year) in first-seen order.
struct IndicatorValues {
    name: String,
    keys: Vec<PanelKey>,
    values: HashMap<PanelKey, Option<f64>>,
}

/// Year column names (`"1990"`, `"1991"`, ...) for an inclusive range.
pub fn year_columns(start: i32, end: i32) -> Vec<String> {
    (start..=end).map(|year| year.to_string()).collect()
}

/// Join several wide indicator tables into a long country-year panel.
///
/// Every row of every table is expanded over `years` (inclusive) and outer
/// joined into `base` on (`country_code`, `year`). Indicator columns already
/// present in `base` are overwritten. Country-years without a matching row
/// keep the indicator null. Joining no tables returns `base` unchanged.
pub fn join_data(
    tables: &[IndicatorTable],
    base: &DataFrame,
    years: (i32, i32),
) -> Result<DataFrame, ProcessorError> {
    if tables.is_empty() {
        return Ok(base.clone());
    }

    let (start, end) = years;
    if start > end {
        return Err(ProcessorError::InvalidYearRange { start, end });
    }
    if let Some(table) = tables
        .iter()
        .find(|t| t.name == COUNTRY_CODE || t.name == YEAR)
    {
        return Err(ProcessorError::ReservedName(table.name.clone()));
    }

    // Each table is independent, expand them in parallel
    let expanded = tables
        .par_iter()
        .map(|table| expand_indicator(table, start, end))
        .collect::<Result<Vec<_>, _>>()?;

    // A later table with the same name replaces the earlier one
    let mut indicators: Vec<&IndicatorValues> = Vec::with_capacity(expanded.len());
    for indicator in &expanded {
        match indicators.iter().position(|i| i.name == indicator.name) {
            Some(pos) => indicators[pos] = indicator,
            None => indicators.push(indicator),
        }
    }

    let mut keys = base_keys(base)?;
    let base_rows = keys.len();
    let mut seen: HashSet<PanelKey> = keys.iter().cloned().collect();
    for indicator in &indicators {
        for key in &indicator.keys {
            if seen.insert(key.clone()) {
                keys.push(key.clone());
            }
        }
    }
    let appended = keys.len() - base_rows;

    let mut columns = vec![
        Column::new(
            COUNTRY_CODE.into(),
            keys.iter().map(|(code, _)| code.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            YEAR.into(),
            keys.iter().map(|(_, year)| *year).collect::<Vec<i32>>(),
        ),
    ];

    // Carry the remaining base columns, padded with nulls for new keys
    for column in base.get_columns() {
        let name = column.name().as_str();
        if name == COUNTRY_CODE || name == YEAR || indicators.iter().any(|i| i.name == name) {
            continue;
        }
        let mut series = column.as_materialized_series().clone();
        series.append(&Series::full_null(
            column.name().clone(),
            appended,
            column.dtype(),
        ))?;
        columns.push(series.into());
    }

    for indicator in &indicators {
        let values: Vec<Option<f64>> = keys
            .iter()
            .map(|key| indicator.values.get(key).copied().flatten())
            .collect();
        columns.push(Column::new(indicator.name.as_str().into(), values));
    }

    let panel =
        DataFrame::new(columns)?.sort([COUNTRY_CODE, YEAR], SortMultipleOptions::default())?;
    debug!(
        "Joined {} indicators: {} base rows, {} appended, {} total",
        indicators.len(),
        base_rows,
        appended,
        panel.height()
    );

    Ok(panel)
}

/// Existing (country, year) keys of the base panel, in row order.
fn base_keys(base: &DataFrame) -> Result<Vec<PanelKey>, ProcessorError> {
    if base.width() == 0 {
        return Ok(Vec::new());
    }

    let codes = base.column(COUNTRY_CODE)?.cast(&DataType::String)?;
    let years = base.column(YEAR)?.cast(&DataType::Int32)?;

    let keys = codes
        .str()?
        .into_iter()
        .zip(years.i32()?.into_iter())
        .map(|pair| match pair {
            (Some(code), Some(year)) => Ok((code.to_string(), year)),
            _ => Err(PolarsError::ComputeError(
                "null country_code or year in base panel".into(),
            )),
        })
        .collect::<PolarsResult<Vec<_>>>()?;

    Ok(keys)
}

/// Expand one wide table into its (country, year) -> value mapping.
///
/// Year columns the table does not carry yield absent values. When a country
/// appears on several rows the first non-null value wins.
fn expand_indicator(
    table: &IndicatorTable,
    start: i32,
    end: i32,
) -> Result<IndicatorValues, ProcessorError> {
    let df = &table.frame;
    let codes = df.column(COUNTRY_CODE)?.cast(&DataType::String)?;
    let codes = codes.str()?;

    let mut year_values: Vec<(i32, Float64Chunked)> = Vec::new();
    for (year, name) in (start..=end).zip(year_columns(start, end)) {
        let Ok(column) = df.column(&name) else {
            continue;
        };
        let values = column
            .as_materialized_series()
            .strict_cast(&DataType::Float64)?;
        year_values.push((year, values.f64()?.clone()));
    }

    let mut keys = Vec::new();
    let mut values: HashMap<PanelKey, Option<f64>> = HashMap::new();

    for row in 0..df.height() {
        let Some(code) = codes.get(row) else {
            continue;
        };

        for year in start..=end {
            let value = year_values
                .iter()
                .find(|(y, _)| *y == year)
                .and_then(|(_, ca)| ca.get(row))
                .filter(|v| !v.is_nan());

            let key = (code.to_string(), year);
            match values.entry(key) {
                Entry::Vacant(entry) => {
                    keys.push(entry.key().clone());
                    entry.insert(value);
                }
                Entry::Occupied(mut entry) => {
                    if entry.get().is_none() {
                        entry.insert(value);
                    }
                }
            }
        }
    }

    debug!(
        "Expanded indicator '{}': {} rows -> {} country-years ({} year columns)",
        table.name,
        df.height(),
        keys.len(),
        year_values.len()
    );

    Ok(IndicatorValues {
        name: table.name.clone(),
        keys,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,country_panel::data=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn value_at(panel: &DataFrame, code: &str, year: i32, column: &str) -> Result<Option<f64>> {
        let codes = panel.column(COUNTRY_CODE)?.str()?.clone();
        let years = panel.column(YEAR)?.i32()?.clone();
        let values = panel.column(column)?.f64()?.clone();
        for row in 0..panel.height() {
            if codes.get(row) == Some(code) && years.get(row) == Some(year) {
                return Ok(values.get(row));
            }
        }
        anyhow::bail!("no row for {code}/{year}")
    }

    fn empty_base() -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new(COUNTRY_CODE.into(), Vec::<String>::new()),
            Column::new(YEAR.into(), Vec::<i32>::new()),
        ])?)
    }

    #[test]
    fn test_join_disjoint_years() -> Result<()> {
        init_test_logging();
        let gdp = df!(
            "country_code" => ["USA"],
            "2000" => [1.0],
            "2001" => [2.0]
        )?;
        let pop = df!(
            "country_code" => ["USA"],
            "2002" => [300.0],
            "2003" => [310.0]
        )?;
        let tables = vec![
            IndicatorTable::new("GDP", gdp),
            IndicatorTable::new("Population", pop),
        ];

        let panel = join_data(&tables, &empty_base()?, (2000, 2003))?;

        assert_eq!(panel.height(), 4);
        let names: Vec<&str> = panel
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(names, vec!["country_code", "year", "GDP", "Population"]);

        let years: Vec<i32> = panel.column(YEAR)?.i32()?.into_no_null_iter().collect();
        assert_eq!(years, vec![2000, 2001, 2002, 2003]);
        let unique: HashSet<i32> = years.iter().copied().collect();
        assert_eq!(unique.len(), years.len());

        assert_eq!(value_at(&panel, "USA", 2000, "GDP")?, Some(1.0));
        assert_eq!(value_at(&panel, "USA", 2001, "GDP")?, Some(2.0));
        assert_eq!(value_at(&panel, "USA", 2002, "GDP")?, None);
        assert_eq!(value_at(&panel, "USA", 2002, "Population")?, Some(300.0));
        assert_eq!(value_at(&panel, "USA", 2003, "Population")?, Some(310.0));
        assert_eq!(value_at(&panel, "USA", 2000, "Population")?, None);
        Ok(())
    }

    #[test]
    fn test_join_no_tables_returns_base() -> Result<()> {
        let base = df!(
            "country_code" => ["FRA", "DEU"],
            "year" => [2000i32, 2000],
            "continent_code" => ["EU", "EU"]
        )?;
        let joined = join_data(&[], &base, (2000, 2005))?;
        assert!(joined.equals(&base));
        Ok(())
    }

    #[test]
    fn test_join_keeps_base_columns_and_overwrites_indicator() -> Result<()> {
        let base = df!(
            "country_code" => ["FRA"],
            "year" => [2000i32],
            "continent_code" => ["EU"],
            "GDP" => [99.0]
        )?;
        let gdp = df!(
            "country_code" => ["FRA", "DEU"],
            "2000" => [1.5, 2.5],
            "2001" => [Some(1.6), None]
        )?;

        let panel = join_data(&[IndicatorTable::new("GDP", gdp)], &base, (2000, 2001))?;

        assert_eq!(panel.height(), 4);
        assert_eq!(panel.width(), 4);
        assert_eq!(value_at(&panel, "FRA", 2000, "GDP")?, Some(1.5));
        assert_eq!(value_at(&panel, "FRA", 2001, "GDP")?, Some(1.6));
        assert_eq!(value_at(&panel, "DEU", 2001, "GDP")?, None);

        // Sorted by code then year, so DEU rows come first
        let continents = panel.column("continent_code")?.str()?.clone();
        assert_eq!(continents.get(0), None);
        assert_eq!(continents.get(2), Some("EU"));
        Ok(())
    }

    #[test]
    fn test_join_first_non_null_wins_for_duplicate_rows() -> Result<()> {
        let gdp = df!(
            "country_code" => ["ITA", "ITA"],
            "2010" => [None, Some(4.0)],
            "2011" => [Some(5.0), Some(6.0)]
        )?;
        let panel = join_data(&[IndicatorTable::new("GDP", gdp)], &empty_base()?, (2010, 2011))?;
        assert_eq!(panel.height(), 2);
        assert_eq!(value_at(&panel, "ITA", 2010, "GDP")?, Some(4.0));
        assert_eq!(value_at(&panel, "ITA", 2011, "GDP")?, Some(5.0));
        Ok(())
    }

    #[test]
    fn test_join_missing_country_code_fails() -> Result<()> {
        let table = df!("code" => ["USA"], "2000" => [1.0])?;
        let result = join_data(&[IndicatorTable::new("GDP", table)], &empty_base()?, (2000, 2000));
        assert!(matches!(result, Err(ProcessorError::PolarsError(_))));
        Ok(())
    }

    #[test]
    fn test_join_non_numeric_values_fail() -> Result<()> {
        let table = df!("country_code" => ["USA"], "2000" => ["n/a"])?;
        let result = join_data(&[IndicatorTable::new("GDP", table)], &empty_base()?, (2000, 2000));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_join_invalid_year_range() -> Result<()> {
        let table = df!("country_code" => ["USA"], "2000" => [1.0])?;
        let result = join_data(&[IndicatorTable::new("GDP", table)], &empty_base()?, (2001, 2000));
        assert!(matches!(
            result,
            Err(ProcessorError::InvalidYearRange { start: 2001, end: 2000 })
        ));
        Ok(())
    }

    #[test]
    fn test_join_rejects_key_column_as_indicator() -> Result<()> {
        let table = df!("country_code" => ["USA"], "2000" => [1.0])?;
        for name in [COUNTRY_CODE, YEAR] {
            let tables = [IndicatorTable::new(name, table.clone())];
            let result = join_data(&tables, &empty_base()?, (2000, 2000));
            assert!(matches!(result, Err(ProcessorError::ReservedName(n)) if n == name));
        }
        Ok(())
    }

    #[test]
    fn test_join_at_top_of_year_range() -> Result<()> {
        let last = i32::MAX.to_string();
        let table = DataFrame::new(vec![
            Column::new(COUNTRY_CODE.into(), ["USA"]),
            Column::new(last.as_str().into(), [7.0]),
        ])?;
        let panel = join_data(
            &[IndicatorTable::new("GDP", table)],
            &empty_base()?,
            (i32::MAX - 1, i32::MAX),
        )?;
        assert_eq!(panel.height(), 2);
        assert_eq!(value_at(&panel, "USA", i32::MAX, "GDP")?, Some(7.0));
        assert_eq!(value_at(&panel, "USA", i32::MAX - 1, "GDP")?, None);
        Ok(())
    }

    #[test]
    fn test_year_columns() {
        assert_eq!(year_columns(1999, 2001), vec!["1999", "2000", "2001"]);
        assert!(year_columns(2001, 2000).is_empty());
    }
}
