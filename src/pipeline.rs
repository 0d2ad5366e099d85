use crate::{
    blend::{self, BlendMethod},
    config::BlendConfig,
    error::BlendError,
    histogram::ImageHistogram,
    raster::Raster,
};
use image::RgbImage;

/// Raw, unvalidated form values as they arrive with a request.
#[derive(Clone, Debug, Default)]
pub struct BlendForm {
    pub image1: Option<Vec<u8>>,
    pub image2: Option<Vec<u8>>,
    pub blend_level: Option<String>,
    pub method: Option<String>,
    pub difference: bool,
}

/// Which histograms to compute alongside the blend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Analysis {
    #[default]
    None,
    Histograms,
    /// Histograms plus the distribution of `image1 − blended`.
    WithDifference,
}

/// A validated blend request. Constructing one guarantees both images are
/// present and the coefficient is within `[0, 1]`.
#[derive(Clone, Debug)]
pub struct BlendRequest {
    image1: Vec<u8>,
    image2: Vec<u8>,
    alpha: f32,
    method: BlendMethod,
    analysis: Analysis,
}

impl BlendRequest {
    /// Checks the coefficient range and that both images carry bytes. Decoding
    /// happens later, in [`run`].
    pub fn new(
        image1: Vec<u8>,
        image2: Vec<u8>,
        alpha: f32,
        method: BlendMethod,
    ) -> Result<Self, BlendError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(BlendError::CoefficientOutOfRange(alpha));
        }
        if image1.is_empty() {
            return Err(BlendError::MissingImage("image1"));
        }
        if image2.is_empty() {
            return Err(BlendError::MissingImage("image2"));
        }
        Ok(Self {
            image1,
            image2,
            alpha,
            method,
            analysis: Analysis::None,
        })
    }

    /// Validates a submitted form under the configured policies. The
    /// coefficient and method are checked before the images.
    pub fn from_form(form: BlendForm, config: &BlendConfig) -> Result<Self, BlendError> {
        let alpha = config.alpha_policy.parse(form.blend_level.as_deref())?;
        let method = config.method_policy.parse(form.method.as_deref())?;
        Self::new(
            form.image1.unwrap_or_default(),
            form.image2.unwrap_or_default(),
            alpha,
            method,
        )
    }

    /// Requests histograms alongside the blend.
    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.analysis = analysis;
        self
    }

    /// Weight applied to the first image.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Method selected at validation time.
    pub fn method(&self) -> BlendMethod {
        self.method
    }

    /// Histograms to compute alongside the blend.
    pub fn analysis(&self) -> Analysis {
        self.analysis
    }
}

/// Color distributions of the inputs and the result.
#[derive(Clone, Debug)]
pub struct BlendHistograms {
    /// Source histograms are taken before resizing.
    pub image1: ImageHistogram,
    pub image2: ImageHistogram,
    pub blended: ImageHistogram,
    /// `resized image1 − blended`, only with [`Analysis::WithDifference`].
    pub difference: Option<ImageHistogram>,
}

/// Output of [`run`]: the blended image at the common size plus any requested
/// histograms.
#[derive(Clone, Debug)]
pub struct BlendResult {
    pub blended: RgbImage,
    pub alpha: f32,
    pub method: BlendMethod,
    pub histograms: Option<BlendHistograms>,
}

/// Runs decode → resize → blend → histograms for one request.
pub fn run(request: &BlendRequest, config: &BlendConfig) -> Result<BlendResult, BlendError> {
    config.histogram.validate()?;

    let source1 = Raster::decode("image1", &request.image1)?;
    let source2 = Raster::decode("image2", &request.image2)?;

    let (resized1, resized2) =
        blend::resize_to_common(source1.as_rgb(), source2.as_rgb(), config.filter)?;
    let blended = blend::blend(&resized1, &resized2, request.alpha, request.method)?;
    log::debug!(
        "Blended {}x{} with {} at {}",
        blended.width(),
        blended.height(),
        request.method.as_str(),
        request.alpha
    );

    let bins = config.histogram.bins;
    let histograms = match request.analysis {
        Analysis::None => None,
        Analysis::Histograms | Analysis::WithDifference => Some(BlendHistograms {
            image1: ImageHistogram::of_raster(&source1, bins)?,
            image2: ImageHistogram::of_raster(&source2, bins)?,
            blended: ImageHistogram::of_rgb(&blended, bins)?,
            difference: match request.analysis {
                Analysis::WithDifference => {
                    Some(ImageHistogram::difference(&resized1, &blended, bins)?)
                }
                _ => None,
            },
        }),
    };

    Ok(BlendResult {
        blended,
        alpha: request.alpha,
        method: request.method,
        histograms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blend::AlphaPolicy, raster::encode_png};
    use image::Rgb;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb(color))).unwrap()
    }

    fn form(level: &str) -> BlendForm {
        BlendForm {
            image1: Some(png(50, 50, [255, 255, 255])),
            image2: Some(png(100, 100, [0, 0, 0])),
            blend_level: Some(level.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn output_uses_smallest_dimensions() {
        let config = BlendConfig::default();
        let request = BlendRequest::from_form(form("0.5"), &config).unwrap();
        let result = run(&request, &config).unwrap();
        assert_eq!(result.blended.dimensions(), (50, 50));
        assert_eq!(result.method, BlendMethod::Linear);
        assert!(result.histograms.is_none());
        for px in result.blended.pixels() {
            assert!(px.0.iter().all(|c| c.abs_diff(127) <= 1));
        }
    }

    #[test]
    fn out_of_range_coefficient_is_rejected_before_decoding() {
        let config = BlendConfig::default();
        let mut bad = form("1.5");
        bad.image1 = Some(b"not an image".to_vec());
        assert!(matches!(
            BlendRequest::from_form(bad, &config),
            Err(BlendError::CoefficientOutOfRange(_))
        ));
    }

    #[test]
    fn clamp_policy_accepts_out_of_range() {
        let config = BlendConfig {
            alpha_policy: AlphaPolicy::Clamp,
            ..Default::default()
        };
        let request = BlendRequest::from_form(form("1.5"), &config).unwrap();
        assert_eq!(request.alpha(), 1.0);
        let result = run(&request, &config).unwrap();
        assert_eq!(result.blended.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn missing_images_are_rejected() {
        let config = BlendConfig::default();
        let mut no_second = form("0.5");
        no_second.image2 = None;
        assert!(matches!(
            BlendRequest::from_form(no_second, &config),
            Err(BlendError::MissingImage("image2"))
        ));
        assert!(matches!(
            BlendRequest::new(Vec::new(), vec![1], 0.5, BlendMethod::Linear),
            Err(BlendError::MissingImage("image1"))
        ));
    }

    #[test]
    fn undecodable_image_is_a_client_error() {
        let config = BlendConfig::default();
        let mut garbage = form("0.5");
        garbage.image2 = Some(b"GIF89a but not really".to_vec());
        let request = BlendRequest::from_form(garbage, &config).unwrap();
        let err = run(&request, &config).unwrap_err();
        assert!(matches!(err, BlendError::Decode { name: "image2", .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn histograms_cover_sources_and_result() {
        let config = BlendConfig::default();
        let request = BlendRequest::from_form(form("0.25"), &config)
            .unwrap()
            .with_analysis(Analysis::WithDifference);
        let result = run(&request, &config).unwrap();
        let histograms = result.histograms.unwrap();
        assert_eq!(histograms.image1.pixel_count(), 50 * 50);
        assert_eq!(histograms.image2.pixel_count(), 100 * 100);
        assert_eq!(histograms.blended.pixel_count(), 50 * 50);
        let difference = histograms.difference.unwrap();
        for channel in difference.channels() {
            assert_eq!(channel.total(), 50 * 50);
        }
    }
}
