//! Minimal bar-chart rendering for histograms.
//!
//! Channels are drawn as overlapping translucent bars on a white canvas with a
//! light quarter grid, which is enough to eyeball a color distribution.
//!
//! Count charts are scaled to their tallest bar. Density charts use a fixed
//! axis on which a uniform distribution reaches the first grid line, so charts
//! of different images can be compared directly.

use crate::{
    blend::mix,
    error::BlendError,
    histogram::{HistogramMode, ImageHistogram},
    raster::png_base64,
};
use image::{Rgb, RgbImage};

pub const CHART_WIDTH: u32 = 640;
pub const CHART_HEIGHT: u32 = 240;
const MARGIN: u32 = 20;
const BAR_OPACITY: f32 = 0.7;
/// Top of the density axis as a multiple of the uniform density.
const DENSITY_CEILING: f64 = 4.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([228, 228, 228]);
const AXIS: Rgb<u8> = Rgb([90, 90, 90]);

/// Plots every channel of `histogram` on a `CHART_WIDTH × CHART_HEIGHT` canvas.
pub fn render(histogram: &ImageHistogram, mode: HistogramMode) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, BACKGROUND);
    let plot_w = CHART_WIDTH - 2 * MARGIN;
    let plot_h = CHART_HEIGHT - 2 * MARGIN;
    let baseline = MARGIN + plot_h;

    for quarter in 1..4 {
        let y = MARGIN + plot_h * quarter / 4;
        for x in MARGIN..MARGIN + plot_w {
            canvas.put_pixel(x, y, GRID);
        }
    }

    let series: Vec<_> = histogram
        .channels()
        .iter()
        .map(|h| (h.channel().color(), h.values(mode)))
        .collect();
    let top = match mode {
        HistogramMode::Count => series
            .iter()
            .flat_map(|(_, values)| values.iter().copied())
            .fold(0.0_f64, f64::max),
        HistogramMode::Density => histogram.channels().first().map_or(0.0, |h| {
            let (low, high) = h.range();
            DENSITY_CEILING / (high - low + 1) as f64
        }),
    };

    if top > 0.0 {
        for (color, values) in &series {
            let bins = values.len() as u32;
            for (i, value) in values.iter().enumerate() {
                let i = i as u32;
                let x0 = MARGIN + i * plot_w / bins;
                let x1 = (MARGIN + (i + 1) * plot_w / bins).max(x0 + 1);
                let bar = ((value / top) * plot_h as f64).round().min(plot_h as f64) as u32;
                for x in x0..x1 {
                    for y in baseline - bar..baseline {
                        let dst = canvas.get_pixel_mut(x, y);
                        for c in 0..3 {
                            dst[c] = mix(color[c], dst[c], BAR_OPACITY, 1.0 - BAR_OPACITY);
                        }
                    }
                }
            }
        }
    }

    for x in MARGIN - 1..MARGIN + plot_w {
        canvas.put_pixel(x, baseline, AXIS);
    }
    for y in MARGIN..=baseline {
        canvas.put_pixel(MARGIN - 1, y, AXIS);
    }

    canvas
}

/// Renders the chart and returns it as base64 PNG.
pub fn render_base64(histogram: &ImageHistogram, mode: HistogramMode) -> Result<String, BlendError> {
    png_base64(&render(histogram, mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_image_draws_single_full_bar() {
        let image = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        let hist = ImageHistogram::of_rgb(&image, 4).unwrap();
        let chart = render(&hist, HistogramMode::Count);
        assert_eq!(chart.dimensions(), (CHART_WIDTH, CHART_HEIGHT));

        // red peaks in the last bin, green and blue in the first; all reach the top
        let top = MARGIN;
        let last_bin_x = MARGIN + 3 * (CHART_WIDTH - 2 * MARGIN) / 4 + 2;
        assert_ne!(chart.get_pixel(last_bin_x, top), &BACKGROUND);
        assert_ne!(chart.get_pixel(MARGIN + 2, top), &BACKGROUND);
        // the middle bins stay empty above the baseline
        assert_eq!(chart.get_pixel(CHART_WIDTH / 2 - 5, top + 5), &BACKGROUND);
    }

    #[test]
    fn density_uses_a_fixed_axis() {
        // every intensity once: a uniform distribution
        let ramp = RgbImage::from_fn(256, 1, |x, _| Rgb([x as u8; 3]));
        let hist = ImageHistogram::of_rgb(&ramp, 256).unwrap();
        let count = render(&hist, HistogramMode::Count);
        let density = render(&hist, HistogramMode::Density);
        assert_ne!(count, density);

        let plot_h = CHART_HEIGHT - 2 * MARGIN;
        let baseline = MARGIN + plot_h;
        let x = CHART_WIDTH / 2;
        // count bars reach the top of the plot
        assert_ne!(count.get_pixel(x, MARGIN + 5), &BACKGROUND);
        // density bars stop at the first quarter of the axis
        assert_eq!(density.get_pixel(x, MARGIN + 5), &BACKGROUND);
        assert_ne!(density.get_pixel(x, baseline - plot_h / 4), &BACKGROUND);
        assert_eq!(density.get_pixel(x, baseline - plot_h / 4 - 1), &BACKGROUND);
    }

    #[test]
    fn density_bars_are_capped_at_the_top() {
        let solid = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let hist = ImageHistogram::of_rgb(&solid, 16).unwrap();
        let chart = render(&hist, HistogramMode::Density);
        let last_bin_x = CHART_WIDTH - MARGIN - 2;
        assert_ne!(chart.get_pixel(last_bin_x, MARGIN), &BACKGROUND);
    }

    #[test]
    fn base64_output_is_png() {
        use base64::{Engine, engine::general_purpose::STANDARD};
        let hist = ImageHistogram::of_rgb(&RgbImage::new(3, 3), 50).unwrap();
        let bytes = STANDARD.decode(render_base64(&hist, HistogramMode::Density).unwrap()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
