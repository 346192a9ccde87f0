//! Chart rendering for sensor series.
//!
//! Charts are laid out with plotters' SVG backend, rasterized to PNG with
//! resvg and handed out as a [`ChartArtifact`] that embeds itself as a base64
//! data URI.

pub mod artifact;
pub mod renderer;

pub use artifact::ChartArtifact;
pub use renderer::{ChartOptions, ChartRenderer};
