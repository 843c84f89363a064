//! Series extraction and PNG rasterization

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sqlchat_core::QueryResult;

use crate::error::ChartError;
use crate::plan::ChartKind;

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 500;
const MARGIN: u32 = 50;
const MAX_POINTS: usize = 500;
const GRID_LINES: u32 = 5;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([230, 0, 0]),
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([23, 190, 207]),
];

/// Label/value pairs pulled from a query result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    /// First column gives labels, the first numeric column after it gives values.
    /// A single numeric column is labelled by row number.
    pub fn from_result(result: &QueryResult) -> Result<Self, ChartError> {
        let value_col = match result.columns.len() {
            0 => return Err(ChartError::NoNumericColumn),
            1 => 0,
            n => (1..n)
                .find(|&c| result.rows.iter().any(|r| r.get(c).and_then(as_number).is_some()))
                .ok_or(ChartError::NoNumericColumn)?,
        };
        let label_col = if result.columns.len() == 1 { None } else { Some(0) };

        let mut series = Series::default();
        for (idx, row) in result.rows.iter().take(MAX_POINTS).enumerate() {
            let Some(value) = row.get(value_col).and_then(as_number) else {
                continue;
            };
            let label = match label_col.and_then(|c| row.get(c)) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) => "None".to_string(),
                Some(other) => other.to_string(),
                None => (idx + 1).to_string(),
            };
            series.labels.push(label);
            series.values.push(value);
        }

        if label_col.is_none() && series.values.is_empty() && !result.rows.is_empty() {
            return Err(ChartError::NoNumericColumn);
        }
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric x positions when every label parses as a number
    fn numeric_labels(&self) -> Option<Vec<f64>> {
        self.labels.iter().map(|l| l.trim().parse::<f64>().ok()).collect()
    }
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Vertical value → pixel mapping over the plot area
struct YScale {
    min: f64,
    max: f64,
}

impl YScale {
    fn new(values: &[f64]) -> Self {
        let mut min = values.iter().cloned().fold(0.0_f64, f64::min);
        let mut max = values.iter().cloned().fold(0.0_f64, f64::max);
        if (max - min).abs() < f64::EPSILON {
            min -= 1.0;
            max += 1.0;
        }
        Self { min, max }
    }

    fn y(&self, value: f64) -> i64 {
        let top = MARGIN as f64;
        let bottom = (HEIGHT - MARGIN) as f64;
        let t = (value - self.min) / (self.max - self.min);
        (bottom - t * (bottom - top)).round() as i64
    }
}

/// Draw `series` as the given kind and encode PNG bytes
pub fn render_png(kind: ChartKind, series: &Series) -> Result<Vec<u8>, ChartError> {
    if series.is_empty() {
        return Err(ChartError::EmptySeries);
    }

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let scale = YScale::new(&series.values);
    let left = MARGIN as i64;
    let right = (WIDTH - MARGIN) as i64;
    let top = MARGIN as i64;
    let bottom = (HEIGHT - MARGIN) as i64;

    for i in 0..=GRID_LINES {
        let y = top + (bottom - top) * i64::from(i) / i64::from(GRID_LINES);
        draw_line(&mut img, (left, y), (right, y), GRID, 1);
    }

    let zero = scale.y(0.0);
    match kind {
        ChartKind::Bar | ChartKind::None => {
            let slot = (right - left) as f64 / series.len() as f64;
            let bar = (slot * 0.7).max(1.0);
            for (i, &value) in series.values.iter().enumerate() {
                let x0 = left as f64 + slot * i as f64 + (slot - bar) / 2.0;
                let y = scale.y(value);
                fill_rect(
                    &mut img,
                    x0.round() as i64,
                    y.min(zero),
                    (x0 + bar).round() as i64,
                    y.max(zero),
                    PALETTE[i % PALETTE.len()],
                );
            }
        }
        ChartKind::Line | ChartKind::Scatter => {
            let xs = x_positions(series, left, right);
            let points: Vec<(i64, i64)> = xs
                .iter()
                .zip(&series.values)
                .map(|(&x, &v)| (x, scale.y(v)))
                .collect();
            if kind == ChartKind::Line {
                for pair in points.windows(2) {
                    draw_line(&mut img, pair[0], pair[1], PALETTE[1], 2);
                }
            }
            for &(x, y) in &points {
                fill_rect(&mut img, x - 3, y - 3, x + 3, y + 3, PALETTE[0]);
            }
        }
    }

    draw_line(&mut img, (left, top), (left, bottom), AXIS, 2);
    draw_line(&mut img, (left, zero), (right, zero), AXIS, 2);

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

fn x_positions(series: &Series, left: i64, right: i64) -> Vec<i64> {
    let width = (right - left) as f64;
    if let Some(xs) = series.numeric_labels() {
        let min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max > min {
            return xs
                .iter()
                .map(|x| left + ((x - min) / (max - min) * width).round() as i64)
                .collect();
        }
    }
    let n = series.len();
    if n == 1 {
        return vec![left + (width / 2.0) as i64];
    }
    (0..n)
        .map(|i| left + (width * i as f64 / (n - 1) as f64).round() as i64)
        .collect()
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    for y in y0..=y1 {
        for x in x0..=x1 {
            put(img, x, y, color);
        }
    }
}

/// Bresenham line, thickened by stamping a square brush
fn draw_line(
    img: &mut RgbImage,
    (x0, y0): (i64, i64),
    (x1, y1): (i64, i64),
    color: Rgb<u8>,
    thickness: i64,
) {
    let (mut x, mut y) = (x0, y0);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = thickness / 2;

    loop {
        let (x0, y0) = (x - half, y - half);
        fill_rect(img, x0, y0, x0 + thickness - 1, y0 + thickness - 1, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> QueryResult {
        QueryResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            row_count: rows.len(),
            rows,
        }
    }

    #[test]
    fn test_series_label_and_value() {
        let r = result(
            &["Country", "Name", "GDP"],
            vec![
                vec![json!("Canada"), json!("x"), json!(2.1)],
                vec![json!("USA"), json!("y"), json!("25.4")],
            ],
        );
        let series = Series::from_result(&r).unwrap();
        assert_eq!(series.labels, vec!["Canada", "USA"]);
        assert_eq!(series.values, vec![2.1, 25.4]);
    }

    #[test]
    fn test_series_single_column_numbered() {
        let r = result(&["n"], vec![vec![json!(5)], vec![json!(7)]]);
        let series = Series::from_result(&r).unwrap();
        assert_eq!(series.labels, vec!["1", "2"]);
        assert_eq!(series.values, vec![5.0, 7.0]);
    }

    #[test]
    fn test_series_needs_numbers() {
        let r = result(&["a", "b"], vec![vec![json!("x"), json!("y")]]);
        assert!(matches!(Series::from_result(&r), Err(ChartError::NoNumericColumn)));
    }

    #[test]
    fn test_render_png_for_each_kind() {
        let series = Series {
            labels: vec!["2019".into(), "2020".into(), "2021".into()],
            values: vec![3.0, -1.5, 8.0],
        };
        for kind in [ChartKind::Bar, ChartKind::Line, ChartKind::Scatter] {
            let png = render_png(kind, &series).unwrap();
            assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

            let decoded = image::load_from_memory(&png).unwrap();
            assert_eq!(decoded.width(), WIDTH);
            assert_eq!(decoded.height(), HEIGHT);
        }
    }

    #[test]
    fn test_render_draws_bars() {
        let series = Series {
            labels: vec!["a".into()],
            values: vec![10.0],
        };
        let png = render_png(ChartKind::Bar, &series).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        let center = img.get_pixel(WIDTH / 2, HEIGHT / 2);
        assert_eq!(*center, PALETTE[0]);
    }

    #[test]
    fn test_render_rejects_empty() {
        assert!(matches!(
            render_png(ChartKind::Bar, &Series::default()),
            Err(ChartError::EmptySeries)
        ));
    }
}
