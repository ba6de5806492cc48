//! Charts module - Chart rendering

mod error;
mod geo;
mod plotter;
mod renderer;
mod surface;

pub use error::ChartError;
pub use geo::{GeoShapes, Ring};
pub use plotter::{AreaSeries, ChartPlotter, EMPTY_DATASET_NOTICE, GRID_COLUMNS};
pub use renderer::{MapClasses, MapRenderer, NO_DATA_LABEL};
pub use surface::{Backend, Figure, PlotSurface};
