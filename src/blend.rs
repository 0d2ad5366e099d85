use crate::error::BlendError;
use image::{
    RgbImage,
    imageops::{self, FilterType},
};
use std::str::FromStr;

/// Coefficient used when a request does not carry one.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// How two pixels are combined before the final linear mix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMethod {
    /// `A·α + B·(1−α)`.
    #[default]
    Linear,
    /// `A·B/255`, then mixed with `A`.
    Multiply,
    /// `255 − (255−A)(255−B)/255`, then mixed with `A`.
    Screen,
}

impl BlendMethod {
    pub const ALL: [BlendMethod; 3] = [
        BlendMethod::Linear,
        BlendMethod::Multiply,
        BlendMethod::Screen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMethod::Linear => "linear",
            BlendMethod::Multiply => "multiply",
            BlendMethod::Screen => "screen",
        }
    }

    /// The value that gets weighted by `1−α` against `a`.
    #[inline]
    fn precombine(self, a: u8, b: u8) -> u8 {
        let (a, b) = (a as f32, b as f32);
        match self {
            BlendMethod::Linear => b as u8,
            BlendMethod::Multiply => (a * b / 255.0) as u8,
            BlendMethod::Screen => (255.0 - (255.0 - a) * (255.0 - b) / 255.0) as u8,
        }
    }
}

impl FromStr for BlendMethod {
    type Err = BlendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        BlendMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == tag)
            .ok_or_else(|| BlendError::UnknownMethod(s.to_string()))
    }
}

/// What to do with a coefficient outside [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphaPolicy {
    #[default]
    Reject,
    Clamp,
}

impl AlphaPolicy {
    /// Parses the textual coefficient from a form. Missing or blank text yields
    /// [`DEFAULT_ALPHA`].
    pub fn parse(self, text: Option<&str>) -> Result<f32, BlendError> {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(DEFAULT_ALPHA);
        };
        let alpha: f32 = text
            .parse()
            .map_err(|_| BlendError::InvalidCoefficient(text.to_string()))?;
        self.apply(alpha)
    }

    /// Non-finite values are rejected under every policy.
    pub fn apply(self, alpha: f32) -> Result<f32, BlendError> {
        if !alpha.is_finite() {
            return Err(BlendError::InvalidCoefficient(alpha.to_string()));
        }
        match self {
            AlphaPolicy::Reject if !(0.0..=1.0).contains(&alpha) => {
                Err(BlendError::CoefficientOutOfRange(alpha))
            }
            AlphaPolicy::Reject => Ok(alpha),
            AlphaPolicy::Clamp => Ok(alpha.clamp(0.0, 1.0)),
        }
    }
}

/// What to do with an unrecognised method tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MethodPolicy {
    #[default]
    Reject,
    Fallback,
}

impl MethodPolicy {
    /// Missing or blank tags select [`BlendMethod::Linear`].
    pub fn parse(self, tag: Option<&str>) -> Result<BlendMethod, BlendError> {
        let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(BlendMethod::default());
        };
        match (tag.parse::<BlendMethod>(), self) {
            (Ok(method), _) => Ok(method),
            (Err(e), MethodPolicy::Reject) => Err(e),
            (Err(_), MethodPolicy::Fallback) => {
                log::warn!("Unknown blend method {tag:?}, falling back to linear");
                Ok(BlendMethod::Linear)
            }
        }
    }
}

/// Resamples both images to `(min(wA, wB), min(hA, hB))`.
///
/// Aspect ratio is not preserved. An image already at the target size is
/// copied as is.
pub fn resize_to_common(
    a: &RgbImage,
    b: &RgbImage,
    filter: FilterType,
) -> Result<(RgbImage, RgbImage), BlendError> {
    if a.width() == 0 || a.height() == 0 {
        return Err(BlendError::EmptyImage("image1"));
    }
    if b.width() == 0 || b.height() == 0 {
        return Err(BlendError::EmptyImage("image2"));
    }

    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    log::debug!(
        "Resizing {}x{} and {}x{} to {width}x{height}",
        a.width(),
        a.height(),
        b.width(),
        b.height()
    );

    Ok((
        resample(a, width, height, filter),
        resample(b, width, height, filter),
    ))
}

fn resample(image: &RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, filter)
    }
}

/// Blends two equally sized images channel by channel.
///
/// Each output channel is `round(clip(A·α + P·(1−α), 0, 255))` where `P` is the
/// method's pre-combination of `A` and `B` (`B` itself for linear).
pub fn blend(
    a: &RgbImage,
    b: &RgbImage,
    alpha: f32,
    method: BlendMethod,
) -> Result<RgbImage, BlendError> {
    if a.dimensions() != b.dimensions() {
        return Err(BlendError::DimensionMismatch(
            a.width(),
            a.height(),
            b.width(),
            b.height(),
        ));
    }
    if !(0.0..=1.0).contains(&alpha) {
        return Err(BlendError::CoefficientOutOfRange(alpha));
    }

    let beta = 1.0 - alpha;
    let mut out = RgbImage::new(a.width(), a.height());
    for ((dst, pa), pb) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        for c in 0..3 {
            let other = method.precombine(pa[c], pb[c]);
            dst[c] = mix(pa[c], other, alpha, beta);
        }
    }

    Ok(out)
}

#[inline]
pub(crate) fn mix(a: u8, b: u8, alpha: f32, beta: f32) -> u8 {
    (a as f32 * alpha + b as f32 * beta).round().clamp(0.0, 255.0) as u8
}
