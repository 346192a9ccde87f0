use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::NaiveDateTime;

pub const PNG_MIME: &str = "image/png";

/// A rendered chart ready to embed in a page. Built once per render call.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    mime: &'static str,
    bytes: Vec<u8>,
    x_bounds: (NaiveDateTime, NaiveDateTime),
    points: usize,
    alt: String,
}

impl ChartArtifact {
    #[must_use]
    pub fn png(
        png: Vec<u8>,
        x_bounds: (NaiveDateTime, NaiveDateTime),
        points: usize,
        alt: impl Into<String>,
    ) -> Self {
        Self {
            mime: PNG_MIME,
            bytes: png,
            x_bounds,
            points,
            alt: alt.into(),
        }
    }

    #[must_use]
    pub fn mime(&self) -> &'static str {
        self.mime
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Horizontal axis limits the chart was drawn with.
    #[must_use]
    pub fn x_bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        self.x_bounds
    }

    /// Number of readings plotted; zero for a placeholder chart.
    #[must_use]
    pub fn points(&self) -> usize {
        self.points
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.points == 0
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }

    /// HTML `<img>` element carrying the chart inline.
    #[must_use]
    pub fn img_tag(&self) -> String {
        format!(
            "<img src=\"{}\" alt=\"{}\">",
            self.data_uri(),
            html_attr_escape(&self.alt)
        )
    }
}

fn html_attr_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
