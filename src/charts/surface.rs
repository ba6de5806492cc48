//! Plotting Surface
//! Collects rendered figures and user notices; optionally writes figures as PNG.

use super::ChartError;
use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where emitted figures end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Keep figures in memory only
    Memory,
    /// Also write each figure as `NN_<title>.png` into the directory
    Directory(PathBuf),
}

/// A rendered chart.
#[derive(Clone)]
pub struct Figure {
    pub title: String,
    pub image: RgbImage,
}

impl Figure {
    pub fn new(title: impl Into<String>, image: RgbImage) -> Self {
        Self {
            title: title.into(),
            image,
        }
    }

    /// Draw on a white canvas of `size` pixels and capture the result.
    pub fn render<F>(title: &str, size: (u32, u32), draw: F) -> Result<Self, ChartError>
    where
        F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<(), ChartError>,
    {
        let (width, height) = size;
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
            root.fill(&WHITE)?;
            draw(&root)?;
            root.present()?;
        }

        let image = RgbImage::from_raw(width, height, buffer)
            .ok_or(ChartError::BufferSize(width, height))?;
        Ok(Self::new(title, image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// The active plotting surface renderers emit into.
pub struct PlotSurface {
    backend: Backend,
    figures: Vec<Figure>,
    notices: Vec<String>,
}

impl Default for PlotSurface {
    fn default() -> Self {
        Self::new(Backend::Memory)
    }
}

impl PlotSurface {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            figures: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Surface writing PNG files into `dir`, created if missing.
    pub fn directory(dir: impl AsRef<Path>) -> Result<Self, ChartError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self::new(Backend::Directory(dir.as_ref().to_path_buf())))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Emit a figure, returning the written path for directory surfaces.
    pub fn show(&mut self, figure: Figure) -> Result<Option<PathBuf>, ChartError> {
        let path = match &self.backend {
            Backend::Memory => None,
            Backend::Directory(dir) => {
                let path = dir.join(format!(
                    "{:02}_{}.png",
                    self.figures.len() + 1,
                    file_stem(&figure.title)
                ));
                figure.image.save(&path)?;
                info!("Figure saved: {}", path.display());
                Some(path)
            }
        };

        self.figures.push(figure);
        Ok(path)
    }

    /// Print a notice for the user instead of a figure.
    pub fn notify(&mut self, message: &str) {
        println!("\n\n{}", message);
        warn!("{}", message);
        self.notices.push(message.to_string());
    }

    pub fn figures(&self) -> &[Figure] {
        &self.figures
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn last_figure(&self) -> Option<&Figure> {
        self.figures.last()
    }

    /// Hand the collected figures to the caller, leaving the surface empty.
    pub fn take_figures(&mut self) -> Vec<Figure> {
        std::mem::take(&mut self.figures)
    }
}

/// Lowercase file name stem from a chart title.
fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "figure".to_string()
    } else {
        stem.to_string()
    }
}
