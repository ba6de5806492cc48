//! Data module - code lookup and panel joining

mod lookup;
mod processor;

pub use lookup::{code_map_from_json, code_to_country, country_to_code, CodeMap};
pub use processor::{join_data, year_columns, IndicatorTable, ProcessorError};

/// Country code column shared by indicator tables and the panel.
pub const COUNTRY_CODE: &str = "country_code";
/// Year column of the panel (`Int32`).
pub const YEAR: &str = "year";
pub const CONTINENT_CODE: &str = "continent_code";
pub const COUNTRY_NAME: &str = "country_name";
/// Weight column for continental aggregates.
pub const POPULATION: &str = "Population";
