use anyhow::{anyhow, Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::ir::{ChartKind, ChartSeries, ChartSpec, Series, SliceSeries, TableSpec};
use crate::palette::ColorPalette;
use crate::scale::{build_value_scale, CategoryScale};
use crate::{OutputFormat, RenderOptions};

/// Rendering collaborator that receives finished charts and tables.
pub trait Sink {
    fn draw_chart(&mut self, chart: &ChartSpec) -> Result<()>;
    fn draw_table(&mut self, table: &TableSpec) -> Result<()>;
}

/// Plotters-backed chart sink producing PNG or SVG bytes
pub struct Canvas {
    width: u32,
    height: u32,
    format: OutputFormat,
    output: Option<Vec<u8>>,
}

impl Canvas {
    pub fn new(options: &RenderOptions) -> Self {
        Canvas {
            width: options.width,
            height: options.height,
            format: options.format,
            output: None,
        }
    }

    /// Encoded image of the last chart drawn, if any
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn into_output(self) -> Option<Vec<u8>> {
        self.output
    }

    /// RGB buffer size for the canvas dimensions
    fn buffer_len(&self) -> Result<usize> {
        usize::try_from(self.width)
            .ok()
            .zip(usize::try_from(self.height).ok())
            .and_then(|(w, h)| w.checked_mul(h))
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| anyhow!("Canvas size {}x{} is too large", self.width, self.height))
    }

    fn render_png(&self, chart: &ChartSpec) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.buffer_len()?];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                .into_drawing_area();
            draw_chart_on(&root, chart)?;
            root.present()
                .map_err(|e| anyhow!("Failed to present drawing: {e}"))?;
        }

        let mut png_bytes = Vec::new();
        {
            let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
            encoder
                .write_image(&buffer, self.width, self.height, image::ColorType::Rgb8)
                .context("Failed to encode PNG")?;
        }

        Ok(png_bytes)
    }

    fn render_svg(&self, chart: &ChartSpec) -> Result<Vec<u8>> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height))
                .into_drawing_area();
            draw_chart_on(&root, chart)?;
            root.present()
                .map_err(|e| anyhow!("Failed to present drawing: {e}"))?;
        }
        Ok(svg.into_bytes())
    }
}

impl Sink for Canvas {
    fn draw_chart(&mut self, chart: &ChartSpec) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            anyhow::bail!(
                "Canvas size {}x{} has no area (width and height must be at least 1)",
                self.width,
                self.height
            );
        }

        let bytes = match self.format {
            OutputFormat::Png => self.render_png(chart),
            OutputFormat::Svg => self.render_svg(chart),
        }
        .with_context(|| {
            format!("Failed to draw {} chart '{}'", chart.kind.as_str(), chart.mount_id)
        })?;
        self.output = Some(bytes);
        Ok(())
    }

    fn draw_table(&mut self, table: &TableSpec) -> Result<()> {
        anyhow::bail!(
            "Cannot draw table '{}' on an image canvas (use html or json output)",
            table.mount_id
        )
    }
}

fn draw_chart_on<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartSpec,
) -> Result<()> {
    root.fill(&WHITE)
        .map_err(|e| anyhow!("Failed to fill background: {e}"))?;

    if chart.series.is_empty() {
        if let Some(title) = &chart.title {
            root.titled(title, ("sans-serif", 20))
                .map_err(|e| anyhow!("Failed to draw title: {e}"))?;
        }
        return Ok(());
    }

    match chart.kind {
        ChartKind::Column | ChartKind::Line => draw_vertical(root, chart),
        ChartKind::Bar => draw_horizontal(root, chart),
        ChartKind::Pie => draw_pie(root, chart),
    }
}

fn value_series(chart: &ChartSpec) -> Vec<&Series> {
    chart
        .series
        .iter()
        .filter_map(|s| match s {
            ChartSeries::Values(series) => Some(series),
            ChartSeries::Slices(_) => None,
        })
        .collect()
}

/// Finite values of a series with their category index
fn finite_points(series: &Series) -> impl Iterator<Item = (usize, f64)> + '_ {
    series
        .values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|v| v.is_finite()).map(|v| (i, v)))
}

/// Column and line charts: categories along x, values up y
fn draw_vertical<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartSpec,
) -> Result<()> {
    let cats = CategoryScale::new(&chart.categories);
    let (x_min, x_max) = cats.range();
    let (y_min, y_max) = build_value_scale(chart).domain;
    let palette = ColorPalette::category10();
    let series = value_series(chart);

    let mut builder = ChartBuilder::on(root);
    builder.margin(10).x_label_area_size(40).y_label_area_size(50);
    if let Some(title) = &chart.title {
        builder.caption(title, ("sans-serif", 20));
    }
    let mut ctx = builder
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| anyhow!("Failed to build chart: {e}"))?;

    ctx.configure_mesh()
        .x_labels(cats.categories.len().max(1))
        .x_label_formatter(&|x| cats.label_at(*x))
        .draw()
        .map_err(|e| anyhow!("Failed to draw mesh: {e}"))?;

    let num_series = series.len();
    for (series_idx, s) in series.iter().enumerate() {
        let color = parse_color(palette.get_color(series_idx));

        if chart.kind == ChartKind::Column {
            // Side-by-side bars within each category band
            let bar_width = 0.8 / num_series as f64;
            let x_offset = (series_idx as f64 - (num_series as f64 - 1.0) / 2.0) * bar_width;
            let bars = finite_points(s).map(|(cat_idx, y_val)| {
                let x_center = cats.center(cat_idx) + x_offset;
                Rectangle::new(
                    [(x_center - bar_width / 2.0, 0.0), (x_center + bar_width / 2.0, y_val)],
                    color.filled(),
                )
            });
            ctx.draw_series(bars)
                .map_err(|e| anyhow!("Failed to draw bars: {e}"))?
                .label(s.label.clone())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
        } else {
            // Lines break where a category has no value
            for (segment_idx, segment) in line_segments(s).into_iter().enumerate() {
                let points: Vec<(f64, f64)> = segment
                    .into_iter()
                    .map(|(cat_idx, y_val)| (cats.center(cat_idx), y_val))
                    .collect();
                ctx.draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))
                    .map_err(|e| anyhow!("Failed to draw markers: {e}"))?;
                let anno = ctx
                    .draw_series(LineSeries::new(points, color.stroke_width(2)))
                    .map_err(|e| anyhow!("Failed to draw line series: {e}"))?;
                if segment_idx == 0 {
                    anno.label(s.label.clone()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 15, y)], color.stroke_width(2))
                    });
                }
            }
        }
    }

    if num_series > 1 {
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| anyhow!("Failed to draw legend: {e}"))?;
    }

    Ok(())
}

/// Bar charts: categories along y, values across x
fn draw_horizontal<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartSpec,
) -> Result<()> {
    let cats = CategoryScale::new(&chart.categories);
    let (y_min, y_max) = cats.range();
    let (x_min, x_max) = build_value_scale(chart).domain;
    let palette = ColorPalette::category10();
    let series = value_series(chart);

    let mut builder = ChartBuilder::on(root);
    builder.margin(10).x_label_area_size(40).y_label_area_size(80);
    if let Some(title) = &chart.title {
        builder.caption(title, ("sans-serif", 20));
    }
    let mut ctx = builder
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| anyhow!("Failed to build chart: {e}"))?;

    ctx.configure_mesh()
        .y_labels(cats.categories.len().max(1))
        .y_label_formatter(&|y| cats.label_at(*y))
        .draw()
        .map_err(|e| anyhow!("Failed to draw mesh: {e}"))?;

    let num_series = series.len();
    let bar_height = 0.8 / num_series as f64;
    for (series_idx, s) in series.iter().enumerate() {
        let color = parse_color(palette.get_color(series_idx));
        let y_offset = (series_idx as f64 - (num_series as f64 - 1.0) / 2.0) * bar_height;
        let bars = finite_points(s).map(|(cat_idx, x_val)| {
            let y_center = cats.center(cat_idx) + y_offset;
            Rectangle::new(
                [(0.0, y_center - bar_height / 2.0), (x_val, y_center + bar_height / 2.0)],
                color.filled(),
            )
        });
        ctx.draw_series(bars)
            .map_err(|e| anyhow!("Failed to draw bars: {e}"))?
            .label(s.label.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    if num_series > 1 {
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| anyhow!("Failed to draw legend: {e}"))?;
    }

    Ok(())
}

/// Split a series into runs of consecutive categories with finite values
fn line_segments(series: &Series) -> Vec<Vec<(usize, f64)>> {
    let mut segments: Vec<Vec<(usize, f64)>> = Vec::new();
    let mut current: Vec<(usize, f64)> = Vec::new();
    for (i, value) in series.values.iter().enumerate() {
        match value {
            Some(v) if v.is_finite() => current.push((i, *v)),
            _ => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Pie charts draw the first slice series as filled wedges with a legend
fn draw_pie<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &ChartSpec) -> Result<()> {
    let Some(pie) = chart.series.iter().find_map(|s| match s {
        ChartSeries::Slices(pie) => Some(pie),
        ChartSeries::Values(_) => None,
    }) else {
        return Ok(());
    };

    let (width, height) = root.dim_in_pixel();
    if let Some(title) = &chart.title {
        root.draw(&Text::new(
            title.clone(),
            (width as i32 / 2 - 10 * title.chars().count() as i32 / 2, 10),
            ("sans-serif", 20).into_font().color(&BLACK),
        ))
        .map_err(|e| anyhow!("Failed to draw title: {e}"))?;
    }

    let wedges = pie_wedges(pie);
    if wedges.is_empty() {
        return Ok(());
    }

    let palette = ColorPalette::category10();
    let center_x = f64::from(width) / 2.0;
    let center_y = f64::from(height) / 2.0 + 10.0;
    let radius = f64::from(width.min(height)) / 2.5;

    for (i, (start_angle, sweep_angle)) in wedges.iter().enumerate() {
        let color = parse_color(palette.get_color(i));
        let num_segments = ((sweep_angle * 50.0) as usize).max(10);
        let mut vertices = Vec::with_capacity(num_segments + 2);
        vertices.push((center_x as i32, center_y as i32));
        for j in 0..=num_segments {
            let angle = start_angle + sweep_angle * j as f64 / num_segments as f64;
            vertices.push((
                (center_x + radius * angle.cos()) as i32,
                (center_y + radius * angle.sin()) as i32,
            ));
        }
        root.draw(&Polygon::new(vertices, color.filled()))
            .map_err(|e| anyhow!("Failed to draw pie slice: {e}"))?;
    }

    let legend_x = width as i32 - 140;
    let mut legend_y = 30;
    for (i, slice) in pie.slices.iter().take(wedges.len()).enumerate() {
        let color = parse_color(palette.get_color(i));
        root.draw(&Rectangle::new(
            [(legend_x, legend_y), (legend_x + 12, legend_y + 12)],
            color.filled(),
        ))
        .map_err(|e| anyhow!("Failed to draw legend box: {e}"))?;
        root.draw(&Text::new(
            slice.name.clone(),
            (legend_x + 18, legend_y),
            ("sans-serif", 12).into_font().color(&BLACK),
        ))
        .map_err(|e| anyhow!("Failed to draw legend text: {e}"))?;
        legend_y += 18;
    }

    Ok(())
}

/// (start angle, sweep) per slice, starting at twelve o'clock.
///
/// Slices are already ordered largest first; non-finite trailing slices get
/// no wedge. Returns nothing when the slices sum to zero.
fn pie_wedges(pie: &SliceSeries) -> Vec<(f64, f64)> {
    let values: Vec<f64> = pie
        .slices
        .iter()
        .map(|s| s.value)
        .take_while(|v| v.is_finite())
        .collect();
    let total: f64 = values.iter().map(|v| v.abs()).sum();
    if total == 0.0 {
        return Vec::new();
    }

    let mut start_angle = -std::f64::consts::FRAC_PI_2;
    values
        .iter()
        .map(|v| {
            let sweep = v.abs() / total * std::f64::consts::TAU;
            let wedge = (start_angle, sweep);
            start_angle += sweep;
            wedge
        })
        .collect()
}

/// Parse a palette color name to RGBColor
fn parse_color(color: &str) -> RGBColor {
    match color {
        "orange" => RGBColor(255, 127, 14),
        "green" => RGBColor(44, 160, 44),
        "red" => RGBColor(214, 39, 40),
        "purple" => RGBColor(148, 103, 189),
        "brown" => RGBColor(140, 86, 75),
        "pink" => RGBColor(227, 119, 194),
        "gray" => RGBColor(127, 127, 127),
        "olive" => RGBColor(188, 189, 34),
        "cyan" => RGBColor(23, 190, 207),
        _ => RGBColor(31, 119, 180), // blue
    }
}
