use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use plotters::prelude::*;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use crate::chart::artifact::ChartArtifact;
use crate::config::Config;
use crate::error::RenderError;
use crate::model::{format_timestamp, parse_timestamp};

const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const GRID_COLOR: RGBColor = RGBColor(225, 225, 225);
const TEXT_COLOR: RGBColor = RGBColor(40, 40, 40);

/// Room below the plot for the rotated tick labels and the axis description.
const X_LABEL_AREA: u32 = 150;
/// Distance between the axis line and the end of a rotated tick label.
const TICK_LABEL_OFFSET: i32 = 14;

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
    /// Number of labelled positions on the time axis, both bounds included
    pub x_ticks: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 640,
            title: "Temperatures Over Time".to_string(),
            x_desc: "Date and Time".to_string(),
            y_desc: "Temperature (F)".to_string(),
            x_ticks: 7,
        }
    }
}

struct TickLabel {
    x: i32,
    y: i32,
    text: String,
}

type Point = (DateTime<Utc>, f64);

/// Sans-serif faces tried in order when resolving the chart font.
const SANS_FAMILIES: [&str; 6] = [
    "Arial",
    "Helvetica",
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "FreeSans",
];

/// Draws a single-line temperature chart as PNG. Holds no per-chart state;
/// the font database is loaded once and shared between clones.
#[derive(Clone)]
pub struct ChartRenderer {
    options: ChartOptions,
    fonts: Arc<fontdb::Database>,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(ChartOptions::default())
    }
}

impl std::fmt::Debug for ChartRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartRenderer")
            .field("options", &self.options)
            .field("font_faces", &self.fonts.len())
            .finish()
    }
}

impl ChartRenderer {
    #[must_use]
    pub fn new(options: ChartOptions) -> Self {
        Self {
            options,
            fonts: load_fonts(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(ChartOptions {
            width: config.chart_width,
            height: config.chart_height,
            ..ChartOptions::default()
        })
    }

    #[must_use]
    pub fn options(&self) -> &ChartOptions {
        &self.options
    }

    /// Render co-sorted `timestamps` and `values` as a PNG with the time axis
    /// fixed to `[range_start, range_end]`.
    ///
    /// Readings outside the range are not plotted. Empty input produces a
    /// placeholder chart with the same axes and no line.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::LengthMismatch` if the slices differ in length,
    /// `RenderError::Timestamp` for a timestamp not in `YYYY-MM-DD HH:MM:SS`
    /// form, `RenderError::EmptyAxis` if the range is empty,
    /// `RenderError::Drawing` if plotting fails and `RenderError::Rasterize` if
    /// the drawing cannot be encoded as PNG.
    pub fn render<S: AsRef<str>>(
        &self,
        timestamps: &[S],
        values: &[f64],
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<ChartArtifact, RenderError> {
        let (svg, plotted) = self.render_svg(timestamps, values, range_start, range_end)?;
        let png = self.rasterize(&svg)?;

        Ok(ChartArtifact::png(
            png,
            (range_start, range_end),
            plotted,
            self.options.title.clone(),
        ))
    }

    /// Lay the chart out as SVG. Returns the markup and the number of readings
    /// that fall inside the range.
    fn render_svg<S: AsRef<str>>(
        &self,
        timestamps: &[S],
        values: &[f64],
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<(String, usize), RenderError> {
        if timestamps.len() != values.len() {
            return Err(RenderError::LengthMismatch {
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        if range_end <= range_start {
            return Err(RenderError::EmptyAxis {
                start: format_timestamp(range_start),
                end: format_timestamp(range_end),
            });
        }

        let mut points = Vec::with_capacity(timestamps.len());
        for (raw, &value) in timestamps.iter().zip(values) {
            let raw = raw.as_ref();
            let ts = parse_timestamp(raw).map_err(|source| RenderError::Timestamp {
                input: raw.to_string(),
                source,
            })?;
            if value.is_finite() {
                points.push((ts.and_utc(), value));
            }
        }

        let (start, end) = (range_start.and_utc(), range_end.and_utc());
        let plotted = points.iter().filter(|p| p.0 >= start && p.0 <= end).count();
        if plotted < points.len() {
            tracing::debug!(
                outside = points.len() - plotted,
                "Dropping readings outside the chart range"
            );
        }

        let line = clip_to_range(&points, start, end);
        if line.is_empty() {
            tracing::debug!("No readings to plot, drawing placeholder chart");
        }

        let svg = self.draw(&line, range_start, range_end)?;
        Ok((svg, plotted))
    }

    fn rasterize(&self, svg: &str) -> Result<Vec<u8>, RenderError> {
        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&self.fonts);

        let tree = usvg::Tree::from_str(svg, &opt).map_err(rasterize_error)?;
        let mut pixmap = Pixmap::new(self.options.width, self.options.height).ok_or_else(|| {
            RenderError::Rasterize(format!(
                "invalid canvas size {}x{}",
                self.options.width, self.options.height
            ))
        })?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

        pixmap.encode_png().map_err(rasterize_error)
    }

    fn draw(&self, points: &[Point], start: NaiveDateTime, end: NaiveDateTime) -> Result<String, RenderError> {
        let (y_min, y_max) = value_range(points);
        let ticks = tick_positions(start, end, self.options.x_ticks);

        let mut svg = String::new();
        let labels: Vec<TickLabel>;

        {
            let root = SVGBackend::with_string(&mut svg, (self.options.width, self.options.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(drawing_error)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(&self.options.title, ("sans-serif", 24).into_font().color(&TEXT_COLOR))
                .margin(20)
                .x_label_area_size(X_LABEL_AREA)
                .y_label_area_size(70)
                .build_cartesian_2d(start.and_utc()..end.and_utc(), y_min..y_max)
                .map_err(drawing_error)?;

            // plotters rotates text by right angles only; time labels are
            // written into the SVG after presenting, before rasterizing.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .set_tick_mark_size(LabelAreaPosition::Bottom, 0)
                .x_labels(ticks.len())
                .x_label_formatter(&|_: &DateTime<Utc>| String::new())
                .y_labels(10)
                .y_label_formatter(&|v: &f64| format!("{v:.1}"))
                .x_desc(self.options.x_desc.as_str())
                .y_desc(self.options.y_desc.as_str())
                .axis_style(ShapeStyle::from(&TEXT_COLOR).stroke_width(1))
                .light_line_style(ShapeStyle::from(&GRID_COLOR).stroke_width(1))
                .bold_line_style(ShapeStyle::from(&GRID_COLOR).stroke_width(1))
                .label_style(("sans-serif", 12).into_font().color(&TEXT_COLOR))
                .axis_desc_style(("sans-serif", 14).into_font().color(&TEXT_COLOR))
                .draw()
                .map_err(drawing_error)?;

            chart
                .draw_series(ticks.iter().map(|t| {
                    PathElement::new(
                        vec![(t.and_utc(), y_min), (t.and_utc(), y_max)],
                        ShapeStyle::from(&GRID_COLOR).stroke_width(1),
                    )
                }))
                .map_err(drawing_error)?;

            if !points.is_empty() {
                chart
                    .draw_series(LineSeries::new(
                        points.iter().copied(),
                        ShapeStyle::from(&LINE_COLOR).stroke_width(2),
                    ))
                    .map_err(drawing_error)?;
            }

            labels = ticks
                .iter()
                .map(|t| {
                    let (x, y) = chart.backend_coord(&(t.and_utc(), y_min));
                    TickLabel {
                        x,
                        y,
                        text: format_timestamp(*t),
                    }
                })
                .collect();

            root.present().map_err(drawing_error)?;
        }

        insert_rotated_labels(&mut svg, &labels);
        Ok(svg)
    }
}

fn drawing_error<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Drawing(e.to_string())
}

fn rasterize_error<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Rasterize(e.to_string())
}

fn load_fonts() -> Arc<fontdb::Database> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let has_family = |name: &str| {
        db.faces()
            .any(|face| face.families.iter().any(|(family, _)| family == name))
    };
    let sans = SANS_FAMILIES
        .iter()
        .find(|name| has_family(name))
        .map(|name| (*name).to_string())
        .or_else(|| {
            db.faces()
                .next()
                .and_then(|face| face.families.first().map(|(family, _)| family.clone()))
        });

    match sans {
        Some(family) => {
            tracing::debug!(family = %family, faces = db.len(), "Chart font resolved");
            db.set_sans_serif_family(family);
        }
        None => tracing::warn!("No system fonts found, chart text will not be drawn"),
    }

    Arc::new(db)
}

/// Keep the part of the line inside `[start, end]`.
///
/// Readings outside the range are dropped. Where the line crosses a bound, a
/// point interpolated between the two neighbouring readings is placed on the
/// bound so the line still reaches the plot edge.
fn clip_to_range(points: &[Point], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.0);

    let mut clipped = Vec::with_capacity(sorted.len() + 2);
    let mut prev: Option<Point> = None;
    for &point in &sorted {
        if let Some(before) = prev {
            if before.0 < start && point.0 > start {
                clipped.push(interpolate(before, point, start));
            }
            if before.0 < end && point.0 > end {
                clipped.push(interpolate(before, point, end));
            }
        }
        if point.0 >= start && point.0 <= end {
            clipped.push(point);
        }
        prev = Some(point);
    }
    clipped
}

/// Value on the segment `a`..`b` at time `at`, which lies strictly between them.
fn interpolate(a: Point, b: Point, at: DateTime<Utc>) -> Point {
    let span = (b.0 - a.0).num_milliseconds() as f64;
    let offset = (at - a.0).num_milliseconds() as f64;
    (at, a.1 + (b.1 - a.1) * offset / span)
}

/// Y-axis range with 10% padding (at least 1 degree) around the data.
fn value_range(points: &[Point]) -> (f64, f64) {
    let min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 100.0);
    }

    let padding = ((max - min) * 0.1).max(1.0);
    (min - padding, max + padding)
}

/// Evenly spaced label positions from `start` to `end` inclusive.
fn tick_positions(start: NaiveDateTime, end: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    let last = i64::try_from(count.max(2) - 1).unwrap_or(1);
    let span = (end - start).num_seconds();

    (0..=last)
        .map(|i| {
            if i == last {
                end
            } else {
                start + Duration::seconds(span * i / last)
            }
        })
        .collect()
}

fn insert_rotated_labels(svg: &mut String, labels: &[TickLabel]) {
    let mut markup = String::from("\n<!-- Time axis labels -->\n");
    for label in labels {
        let x = label.x;
        let y = label.y + TICK_LABEL_OFFSET;
        markup.push_str(&format!(
            "<text x=\"{x}\" y=\"{y}\" font-family=\"sans-serif\" font-size=\"12\" fill=\"#282828\" \
             text-anchor=\"end\" transform=\"rotate(-45, {x}, {y})\">{}</text>\n",
            label.text
        ));
    }

    if let Some(pos) = svg.rfind("</svg>") {
        svg.insert_str(pos, &markup);
    }
}
