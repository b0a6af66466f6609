use serde::{Deserialize, Serialize};

use crate::{config::AnalysisConfig, signal::Waveform};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Isolated points, e.g. irregular beats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Markers(markers) => &markers.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every series, or `None` if empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

fn guide(name: &str, x_end: f64, y: f64, color: u32) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points: vec![[0.0, y], [x_end, y]],
        style: Style {
            width: 1.0,
            dash: Some([4.0, 4.0]),
            color: Color(color),
        },
    })
}

/// Reading trace with the baseline, the ±threshold band and the irregular
/// samples highlighted. The x axis is in seconds at `fs`, which must be
/// positive.
pub fn figure_from_waveform(
    title: &str,
    w: &Waveform,
    cfg: &AnalysisConfig,
    fs: f64,
    max_points: usize,
) -> Figure {
    let dt = 1.0 / fs;
    let points: Vec<[f64; 2]> = w
        .samples()
        .iter()
        .map(|s| [s.time as f64 * dt, s.value])
        .collect();
    let irregular: Vec<[f64; 2]> = points
        .iter()
        .copied()
        .filter(|p| (p[1] - cfg.baseline).abs() > cfg.deviation_threshold)
        .collect();
    let x_end = points.last().map(|p| p[0]).unwrap_or(0.0);

    let mut fig = Figure::new(Some(title.into()));
    fig.x.label = Some("time (s)".into());
    fig.y.label = Some("amplitude".into());
    fig.add_series(Series::Line(LineSeries {
        name: "ECG".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.4,
            dash: None,
            color: Color(0x1F77B4),
        },
    }));
    fig.add_series(guide("baseline", x_end, cfg.baseline, 0x7F7F7F));
    fig.add_series(guide(
        "upper threshold",
        x_end,
        cfg.baseline + cfg.deviation_threshold,
        0xFF7F0E,
    ));
    fig.add_series(guide(
        "lower threshold",
        x_end,
        cfg.baseline - cfg.deviation_threshold,
        0xFF7F0E,
    ));
    if !irregular.is_empty() {
        fig.add_series(Series::Markers(MarkerSeries {
            name: "irregular".into(),
            points: irregular,
            radius: 3,
            color: Color(0xD62728),
        }));
    }
    fig
}
