use crate::{error::BlendError, raster::Raster};
use image::RgbImage;

/// Whether charts plot raw counts or a normalised density.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistogramMode {
    #[default]
    Count,
    /// `count / (total · bin_width)`, integrating to 1 over the value range.
    Density,
}

/// Bin count and plotting mode used for every histogram of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistogramConfig {
    pub bins: usize,
    pub mode: HistogramMode,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins: 256,
            mode: HistogramMode::Count,
        }
    }
}

impl HistogramConfig {
    /// Bins must lie in `1..=256`.
    pub fn validate(&self) -> Result<(), BlendError> {
        if (1..=256).contains(&self.bins) {
            Ok(())
        } else {
            Err(BlendError::InvalidBins(self.bins))
        }
    }
}

/// The color channel a histogram was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Luma,
}

impl Channel {
    const RGB: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Color used when plotting this channel.
    pub fn color(&self) -> [u8; 3] {
        match self {
            Channel::Red => [220, 40, 40],
            Channel::Green => [40, 170, 40],
            Channel::Blue => [40, 70, 220],
            Channel::Luma => [110, 110, 110],
        }
    }
}

/// Intensity distribution of one channel over `bins` equal-width bins covering
/// the inclusive range `low..=high`.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    channel: Channel,
    low: i32,
    high: i32,
    counts: Vec<u64>,
}

impl Histogram {
    fn new(channel: Channel, bins: usize, low: i32, high: i32) -> Self {
        Self {
            channel,
            low,
            high,
            counts: vec![0; bins],
        }
    }

    #[inline]
    fn add(&mut self, value: i32) {
        let span = (self.high - self.low + 1) as usize;
        let idx = (value - self.low) as usize * self.counts.len() / span;
        self.counts[idx] += 1;
    }

    /// Channel the values were taken from.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Inclusive value range covered by the bins.
    pub fn range(&self) -> (i32, i32) {
        (self.low, self.high)
    }

    /// Raw per-bin pixel counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of all counts, equal to the pixel count of the image.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of intensity values covered by one bin.
    pub fn bin_width(&self) -> f64 {
        (self.high - self.low + 1) as f64 / self.counts.len() as f64
    }

    /// `count / (total · bin_width)` per bin; all zero for an empty histogram.
    pub fn density(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.counts.len()];
        }
        let norm = total as f64 * self.bin_width();
        self.counts.iter().map(|&c| c as f64 / norm).collect()
    }

    /// Per-bin values in the requested mode.
    pub fn values(&self, mode: HistogramMode) -> Vec<f64> {
        match mode {
            HistogramMode::Count => self.counts.iter().map(|&c| c as f64).collect(),
            HistogramMode::Density => self.density(),
        }
    }
}

/// Histograms for every channel of one image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageHistogram {
    channels: Vec<Histogram>,
    pixels: u64,
}

impl ImageHistogram {
    /// Red, green and blue distributions over `[0, 255]`.
    pub fn of_rgb(image: &RgbImage, bins: usize) -> Result<Self, BlendError> {
        check_bins(bins)?;
        let mut channels = Channel::RGB.map(|ch| Histogram::new(ch, bins, 0, 255));
        for px in image.pixels() {
            for (hist, value) in channels.iter_mut().zip(px.0) {
                hist.add(value as i32);
            }
        }
        Ok(Self::checked(channels.into(), image))
    }

    /// A single luma channel for grayscale sources, RGB otherwise.
    pub fn of_raster(raster: &Raster, bins: usize) -> Result<Self, BlendError> {
        if !raster.is_grayscale() {
            return Self::of_rgb(raster.as_rgb(), bins);
        }
        check_bins(bins)?;
        let mut luma = Histogram::new(Channel::Luma, bins, 0, 255);
        for px in raster.as_rgb().pixels() {
            luma.add(px[0] as i32);
        }
        Ok(Self::checked(vec![luma], raster.as_rgb()))
    }

    /// Distribution of `original − processed` per channel, taken as a wrapping
    /// byte difference and read as signed, so it covers `[-128, 127]`.
    pub fn difference(
        original: &RgbImage,
        processed: &RgbImage,
        bins: usize,
    ) -> Result<Self, BlendError> {
        if original.dimensions() != processed.dimensions() {
            return Err(BlendError::DimensionMismatch(
                original.width(),
                original.height(),
                processed.width(),
                processed.height(),
            ));
        }
        check_bins(bins)?;
        let mut channels = Channel::RGB.map(|ch| Histogram::new(ch, bins, -128, 127));
        for (po, pp) in original.pixels().zip(processed.pixels()) {
            for (c, hist) in channels.iter_mut().enumerate() {
                hist.add(po[c].wrapping_sub(pp[c]) as i8 as i32);
            }
        }
        Ok(Self::checked(channels.into(), original))
    }

    fn checked(channels: Vec<Histogram>, image: &RgbImage) -> Self {
        let pixels = image.width() as u64 * image.height() as u64;
        debug_assert!(channels.iter().all(|h| h.total() == pixels));
        Self { channels, pixels }
    }

    /// One histogram per channel: R, G, B or a single luma channel.
    pub fn channels(&self) -> &[Histogram] {
        &self.channels
    }

    /// Number of pixels that were counted.
    pub fn pixel_count(&self) -> u64 {
        self.pixels
    }
}

fn check_bins(bins: usize) -> Result<(), BlendError> {
    HistogramConfig {
        bins,
        mode: HistogramMode::Count,
    }
    .validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn counts_sum_to_pixel_count() {
        let image = gradient(37, 23);
        for bins in [1, 50, 64, 256] {
            let hist = ImageHistogram::of_rgb(&image, bins).unwrap();
            assert_eq!(hist.pixel_count(), 37 * 23);
            assert_eq!(hist.channels().len(), 3);
            for channel in hist.channels() {
                assert_eq!(channel.counts().len(), bins);
                assert_eq!(channel.total(), 37 * 23, "bins={bins}");
            }
        }
    }

    #[test]
    fn extreme_values_land_in_edge_bins() {
        let mut image = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([255, 255, 255]));
        let hist = ImageHistogram::of_rgb(&image, 50).unwrap();
        let red = &hist.channels()[0];
        assert_eq!(red.channel(), Channel::Red);
        assert_eq!(red.counts()[0], 1);
        assert_eq!(red.counts()[49], 1);
    }

    #[test]
    fn density_integrates_to_one() {
        let hist = ImageHistogram::of_rgb(&gradient(20, 20), 64).unwrap();
        for channel in hist.channels() {
            let area: f64 = channel.density().iter().map(|d| d * channel.bin_width()).sum();
            assert!((area - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn grayscale_raster_has_single_channel() {
        let gray = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));
        let png = crate::raster::encode_png(&gray).unwrap();
        let raster = Raster::decode("image1", &png).unwrap();
        // an RGB-encoded PNG is not grayscale even if every pixel is gray
        assert_eq!(ImageHistogram::of_raster(&raster, 256).unwrap().channels().len(), 3);

        let luma = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            4,
            4,
            image::Luma([9]),
        ));
        let mut bytes = Vec::new();
        luma.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let raster = Raster::decode("image1", &bytes).unwrap();
        let hist = ImageHistogram::of_raster(&raster, 256).unwrap();
        assert_eq!(hist.channels().len(), 1);
        assert_eq!(hist.channels()[0].channel(), Channel::Luma);
        assert_eq!(hist.channels()[0].counts()[9], 16);
    }

    #[test]
    fn difference_is_signed() {
        let original = RgbImage::from_pixel(3, 3, Rgb([10, 200, 50]));
        let processed = RgbImage::from_pixel(3, 3, Rgb([20, 100, 50]));
        let hist = ImageHistogram::difference(&original, &processed, 256).unwrap();
        let [red, green, blue] = hist.channels() else {
            panic!("expected three channels");
        };
        assert_eq!(red.range(), (-128, 127));
        // 10 - 20 = -10 -> bin 118
        assert_eq!(red.counts()[118], 9);
        // 200 - 100 = 100 -> bin 228
        assert_eq!(green.counts()[228], 9);
        assert_eq!(blue.counts()[128], 9);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let image = gradient(4, 4);
        assert!(matches!(
            ImageHistogram::of_rgb(&image, 0),
            Err(BlendError::InvalidBins(0))
        ));
        assert!(matches!(
            ImageHistogram::of_rgb(&image, 300),
            Err(BlendError::InvalidBins(300))
        ));
        assert!(matches!(
            ImageHistogram::difference(&image, &gradient(5, 4), 64),
            Err(BlendError::DimensionMismatch(..))
        ));
    }
}
