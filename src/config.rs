use crate::{
    blend::{AlphaPolicy, MethodPolicy},
    histogram::HistogramConfig,
};
use image::imageops::FilterType;
use std::{str::FromStr, time::Duration};

/// Default third-party verification endpoint.
pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Largest accepted multipart body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Parameters of the blend-and-analyze pipeline.
#[derive(Clone, Debug)]
pub struct BlendConfig {
    pub alpha_policy: AlphaPolicy,
    pub method_policy: MethodPolicy,
    pub histogram: HistogramConfig,
    /// Resampling filter used to bring both images to a common size.
    pub filter: FilterType,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            alpha_policy: AlphaPolicy::default(),
            method_policy: MethodPolicy::default(),
            histogram: HistogramConfig::default(),
            filter: FilterType::Lanczos3,
        }
    }
}

/// Which challenge guards the processing endpoint.
#[derive(Clone, Debug)]
pub enum GateConfig {
    Open,
    Captcha {
        length: usize,
        /// Maximum number of outstanding challenges before the oldest is dropped.
        capacity: usize,
    },
    Recaptcha {
        secret: String,
        verify_url: String,
        timeout: Duration,
    },
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig::Captcha {
            length: 6,
            capacity: 1024,
        }
    }
}

impl GateConfig {
    pub fn recaptcha(secret: impl Into<String>) -> Self {
        GateConfig::Recaptcha {
            secret: secret.into(),
            verify_url: RECAPTCHA_VERIFY_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub blend: BlendConfig,
    pub gate: GateConfig,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            blend: BlendConfig::default(),
            gate: GateConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl FromStr for AlphaPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(AlphaPolicy::Reject),
            "clamp" => Ok(AlphaPolicy::Clamp),
            other => Err(format!("unknown alpha policy {other:?}: expected reject or clamp")),
        }
    }
}

impl FromStr for MethodPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(MethodPolicy::Reject),
            "fallback" => Ok(MethodPolicy::Fallback),
            other => Err(format!(
                "unknown method policy {other:?}: expected reject or fallback"
            )),
        }
    }
}
