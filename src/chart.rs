use crate::error::{GardenReportError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

const BMP_HEADER_LEN: u32 = 54;
const MIN_DIMENSION: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    Bar,
    Line,
    StackedBar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub title: String,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
    pub kind: ChartKind,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartImage {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl ChartImage {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

pub trait ChartRenderer: Send + Sync {
    fn render(&self, request: &ChartRequest) -> Result<ChartImage>;
}

/// Renders a chart, turning any failure into `None` so the caller can put a
/// placeholder in its place.
pub fn synthesize(renderer: &dyn ChartRenderer, request: &ChartRequest) -> Option<ChartImage> {
    match renderer.render(request) {
        Ok(image) => {
            debug!(
                "Rendered {:?} chart '{}' ({}x{}, {} bytes)",
                request.kind,
                request.title,
                image.width,
                image.height,
                image.bytes.len()
            );
            Some(image)
        }
        Err(e) => {
            warn!("Chart '{}' could not be rendered: {}", request.title, e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct RasterChartRenderer {
    pub background: [u8; 3],
    pub axis: [u8; 3],
    pub grid: [u8; 3],
    pub max_pixels: u64,
}

impl Default for RasterChartRenderer {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            axis: [55, 65, 81],
            grid: [229, 231, 235],
            max_pixels: 4_000_000,
        }
    }
}

impl ChartRenderer for RasterChartRenderer {
    fn render(&self, request: &ChartRequest) -> Result<ChartImage> {
        self.validate(request)?;

        let mut surface = Surface::new(request.width, request.height, self.background);
        let plot = PlotArea::inside(request.width, request.height);

        let max_value = match request.kind {
            ChartKind::StackedBar => (0..request.labels.len())
                .map(|i| request.series.iter().map(|s| s.values[i]).sum::<f64>())
                .fold(0.0, f64::max),
            _ => request
                .series
                .iter()
                .flat_map(|s| s.values.iter().copied())
                .fold(0.0, f64::max),
        };
        let scale_max = if max_value > 0.0 { max_value * 1.1 } else { 1.0 };

        for step in 1..=4 {
            let y = plot.bottom - (plot.height() * step as i64) / 4;
            surface.draw_line(plot.left, y, plot.right, y, self.grid, 1);
        }

        match request.kind {
            ChartKind::Bar => draw_grouped_bars(&mut surface, &plot, request, scale_max),
            ChartKind::StackedBar => draw_stacked_bars(&mut surface, &plot, request, scale_max),
            ChartKind::Line => draw_lines(&mut surface, &plot, request, scale_max),
        }

        surface.draw_line(plot.left, plot.top, plot.left, plot.bottom, self.axis, 2);
        surface.draw_line(plot.left, plot.bottom, plot.right, plot.bottom, self.axis, 2);

        let slot = plot.slot_width(request.labels.len());
        for i in 0..request.labels.len() {
            let x = plot.left + slot * i as i64 + slot / 2;
            surface.draw_line(x, plot.bottom, x, plot.bottom + 5, self.axis, 1);
        }

        // legend swatches, top-right
        for (i, series) in request.series.iter().enumerate() {
            let x = plot.right - 14 - (i as i64) * 16;
            surface.fill_rect(x, 4, 10, 10, series.color);
        }

        let bytes = surface.encode_bmp();
        Ok(ChartImage {
            width: request.width,
            height: request.height,
            mime_type: "image/bmp".to_string(),
            bytes,
        })
    }
}

impl RasterChartRenderer {
    fn validate(&self, request: &ChartRequest) -> Result<()> {
        if request.width < MIN_DIMENSION || request.height < MIN_DIMENSION {
            return Err(GardenReportError::Chart(format!(
                "surface {}x{} is smaller than {}x{}",
                request.width, request.height, MIN_DIMENSION, MIN_DIMENSION
            )));
        }
        if request.width as u64 * request.height as u64 > self.max_pixels {
            return Err(GardenReportError::Chart(format!(
                "surface {}x{} exceeds {} pixels",
                request.width, request.height, self.max_pixels
            )));
        }
        if request.labels.is_empty() || request.series.is_empty() {
            return Err(GardenReportError::Chart("nothing to plot".to_string()));
        }

        for series in &request.series {
            if series.values.len() != request.labels.len() {
                return Err(GardenReportError::Chart(format!(
                    "series '{}' has {} values for {} labels",
                    series.name,
                    series.values.len(),
                    request.labels.len()
                )));
            }
            if let Some(bad) = series.values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(GardenReportError::Chart(format!(
                    "series '{}' contains invalid value {}",
                    series.name, bad
                )));
            }
        }

        Ok(())
    }
}

struct PlotArea {
    left: i64,
    right: i64,
    top: i64,
    bottom: i64,
}

impl PlotArea {
    fn inside(width: u32, height: u32) -> Self {
        let (w, h) = (width as i64, height as i64);
        Self {
            left: (w / 12).max(16),
            right: w - (w / 30).max(8),
            top: (h / 10).max(18),
            bottom: h - (h / 8).max(14),
        }
    }

    fn width(&self) -> i64 {
        self.right - self.left
    }

    fn height(&self) -> i64 {
        self.bottom - self.top
    }

    fn slot_width(&self, slots: usize) -> i64 {
        (self.width() / slots.max(1) as i64).max(1)
    }

    fn y_for(&self, value: f64, scale_max: f64) -> i64 {
        self.bottom - ((value / scale_max) * self.height() as f64).round() as i64
    }
}

fn draw_grouped_bars(
    surface: &mut Surface,
    plot: &PlotArea,
    request: &ChartRequest,
    scale_max: f64,
) {
    let slot = plot.slot_width(request.labels.len());
    let group = (slot * 7) / 10;
    let bar = (group / request.series.len() as i64).max(1);

    for i in 0..request.labels.len() {
        let group_left = plot.left + slot * i as i64 + (slot - group) / 2;
        for (s, series) in request.series.iter().enumerate() {
            let top = plot.y_for(series.values[i], scale_max);
            let x = group_left + bar * s as i64;
            surface.fill_rect(x, top, bar, plot.bottom - top, series.color);
        }
    }
}

fn draw_stacked_bars(
    surface: &mut Surface,
    plot: &PlotArea,
    request: &ChartRequest,
    scale_max: f64,
) {
    let slot = plot.slot_width(request.labels.len());
    let bar = ((slot * 6) / 10).max(1);

    for i in 0..request.labels.len() {
        let x = plot.left + slot * i as i64 + (slot - bar) / 2;
        let mut running = 0.0;
        for series in &request.series {
            let base = plot.y_for(running, scale_max);
            running += series.values[i];
            let top = plot.y_for(running, scale_max);
            surface.fill_rect(x, top, bar, base - top, series.color);
        }
    }
}

fn draw_lines(surface: &mut Surface, plot: &PlotArea, request: &ChartRequest, scale_max: f64) {
    let slot = plot.slot_width(request.labels.len());

    for series in &request.series {
        let points: Vec<(i64, i64)> = series
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| (plot.left + slot * i as i64 + slot / 2, plot.y_for(*v, scale_max)))
            .collect();

        for pair in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            surface.draw_line(x0, y0, x1, y1, series.color, 2);
        }
        for (x, y) in points {
            surface.fill_rect(x - 3, y - 3, 7, 7, series.color);
        }
    }
}

/// Transient RGB drawing surface.
struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&background);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    fn put_pixel(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels[idx..idx + 3].copy_from_slice(&color);
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: [u8; 3]) {
        for py in y..y + h {
            for px in x..x + w {
                self.put_pixel(px, py, color);
            }
        }
    }

    /// Bresenham line, `thickness` pixels wide.
    fn draw_line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3], thickness: i64) {
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (sx, sy) = (if x0 < x1 { 1 } else { -1 }, if y0 < y1 { 1 } else { -1 });
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        let half = thickness / 2;

        loop {
            self.fill_rect(x - half, y - half, thickness.max(1), thickness.max(1), color);
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

    /// Uncompressed 24-bit BMP, bottom-up rows padded to 4 bytes.
    fn encode_bmp(self) -> Vec<u8> {
        let row_len = self.width * 3;
        let stride = (row_len + 3) & !3;
        let image_size = stride * self.height;
        let file_size = BMP_HEADER_LEN + image_size;

        let mut out = Vec::with_capacity(file_size as usize);
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&BMP_HEADER_LEN.to_le_bytes());

        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(self.width as i32).to_le_bytes());
        out.extend_from_slice(&(self.height as i32).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&image_size.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        let padding = (stride - row_len) as usize;
        for y in (0..self.height as usize).rev() {
            let start = y * row_len as usize;
            for px in self.pixels[start..start + row_len as usize].chunks_exact(3) {
                out.extend_from_slice(&[px[2], px[1], px[0]]);
            }
            out.extend(std::iter::repeat(0u8).take(padding));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: ChartKind) -> ChartRequest {
        ChartRequest {
            title: "Irrigation".to_string(),
            labels: vec!["2024-03".to_string(), "2024-04".to_string(), "2024-05".to_string()],
            series: vec![ChartSeries {
                name: "Average volume (mL)".to_string(),
                values: vec![500.0, 750.0, 600.0],
                color: [37, 99, 235],
            }],
            kind,
            width: 201,
            height: 120,
        }
    }

    #[test]
    fn test_bmp_header_and_size() {
        let image = RasterChartRenderer::default()
            .render(&request(ChartKind::Bar))
            .unwrap();

        assert_eq!(&image.bytes[0..2], b"BM");
        // 201 * 3 = 603 bytes per row, padded to 604
        let expected = 54 + 604 * 120;
        assert_eq!(image.bytes.len(), expected);
        assert_eq!(
            u32::from_le_bytes(image.bytes[2..6].try_into().unwrap()) as usize,
            expected
        );
        assert_eq!(image.mime_type, "image/bmp");
    }

    #[test]
    fn test_every_kind_renders() {
        let renderer = RasterChartRenderer::default();
        for kind in [ChartKind::Bar, ChartKind::Line, ChartKind::StackedBar] {
            let mut req = request(kind);
            req.series.push(ChartSeries {
                name: "second".to_string(),
                values: vec![1.0, 0.0, 3.0],
                color: [220, 38, 38],
            });
            assert!(renderer.render(&req).is_ok(), "{:?} failed", kind);
        }
    }

    #[test]
    fn test_rendering_is_repeatable() {
        let renderer = RasterChartRenderer::default();
        let first = renderer.render(&request(ChartKind::Line)).unwrap();
        let second = renderer.render(&request(ChartKind::Line)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_requests_fail() {
        let renderer = RasterChartRenderer::default();

        let mut mismatched = request(ChartKind::Bar);
        mismatched.series[0].values.pop();
        assert!(renderer.render(&mismatched).is_err());

        let mut nan = request(ChartKind::Bar);
        nan.series[0].values[1] = f64::NAN;
        assert!(renderer.render(&nan).is_err());

        let mut tiny = request(ChartKind::Bar);
        tiny.width = 10;
        assert!(renderer.render(&tiny).is_err());

        let mut empty = request(ChartKind::Bar);
        empty.labels.clear();
        empty.series[0].values.clear();
        assert!(renderer.render(&empty).is_err());
    }

    #[test]
    fn test_synthesize_swallows_failures() {
        let renderer = RasterChartRenderer::default();
        let mut huge = request(ChartKind::Bar);
        huge.width = 10_000;
        huge.height = 10_000;
        assert!(synthesize(&renderer, &huge).is_none());
        assert!(synthesize(&renderer, &request(ChartKind::Bar)).is_some());
    }

    #[test]
    fn test_all_zero_values_still_render() {
        let mut req = request(ChartKind::Bar);
        req.series[0].values = vec![0.0, 0.0, 0.0];
        assert!(RasterChartRenderer::default().render(&req).is_ok());
    }

    #[test]
    fn test_data_uri_and_serde() {
        let image = RasterChartRenderer::default()
            .render(&request(ChartKind::Bar))
            .unwrap();
        assert!(image.to_data_uri().starts_with("data:image/bmp;base64,Qk"));

        let json = serde_json::to_string(&image).unwrap();
        let back: ChartImage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, image);
    }
}
