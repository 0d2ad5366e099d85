use crate::{
    chart,
    error::BlendError,
    histogram::{HistogramMode, ImageHistogram},
    pipeline::BlendResult,
    raster::png_base64,
};
use serde::{Deserialize, Serialize};

/// Successful blend. Images and charts are base64 encoded PNG.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlendResponse {
    pub success: bool,
    pub blended_image: String,
    pub width: u32,
    pub height: u32,
    pub blend_level: f32,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_blended: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_difference: Option<String>,
}

impl BlendResponse {
    /// Encodes the blended image and renders any histograms as charts.
    pub fn encode(result: &BlendResult, mode: HistogramMode) -> Result<Self, BlendError> {
        let chart = |h: &ImageHistogram| chart::render_base64(h, mode);
        let histograms = result.histograms.as_ref();

        Ok(Self {
            success: true,
            blended_image: png_base64(&result.blended)?,
            width: result.blended.width(),
            height: result.blended.height(),
            blend_level: result.alpha,
            method: result.method.as_str().to_string(),
            histogram1: histograms.map(|h| chart(&h.image1)).transpose()?,
            histogram2: histograms.map(|h| chart(&h.image2)).transpose()?,
            histogram_blended: histograms.map(|h| chart(&h.blended)).transpose()?,
            histogram_difference: histograms
                .and_then(|h| h.difference.as_ref())
                .map(chart)
                .transpose()?,
        })
    }
}

/// Failure body sent with every 4xx/5xx status.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl ToString) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

/// A freshly issued text challenge. The id goes back with the answer in the
/// `captcha_id` form field.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptchaResponse {
    pub success: bool,
    pub captcha_id: String,
    pub captcha_text: String,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub state: String,
    pub gate: String,
    pub blends_completed: u64,
    pub blends_rejected: u64,
}
