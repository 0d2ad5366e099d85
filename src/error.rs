/// Errors produced by the blend-and-analyze pipeline.
#[derive(Debug, thiserror::Error)]
pub enum BlendError {
    /// A required image was not supplied or was empty.
    #[error("missing image: {0}")]
    MissingImage(&'static str),

    /// The image bytes could not be decoded.
    #[error("invalid image file {name}: {source}")]
    Decode {
        name: &'static str,
        #[source]
        source: image::ImageError,
    },

    /// The image decoded fine but has no pixels.
    #[error("image {0} has zero width or height")]
    EmptyImage(&'static str),

    /// Two images that must share dimensions do not.
    #[error("dimension mismatch: {0}x{1} vs {2}x{3}")]
    DimensionMismatch(u32, u32, u32, u32),

    /// The blend coefficient is not a decimal number.
    #[error("invalid blend level {0:?}: must be a number between 0 and 1")]
    InvalidCoefficient(String),

    /// The blend coefficient parsed but lies outside [0, 1].
    #[error("blend level {0} out of range: must be between 0 and 1")]
    CoefficientOutOfRange(f32),

    /// The blend method tag is not one of the known methods.
    #[error("unknown blend method {0:?}: expected linear, multiply or screen")]
    UnknownMethod(String),

    /// The histogram bin count is outside 1..=256.
    #[error("invalid histogram bin count {0}: expected 1..=256")]
    InvalidBins(usize),

    /// Encoding the output image failed.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

impl BlendError {
    /// Returns true when the error is caused by the request rather than the server.
    /// A bad bin count comes from server configuration, never from a request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, BlendError::Encode(_) | BlendError::InvalidBins(_))
    }
}

/// Errors produced by the challenge gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("challenge response not received, please complete the verification")]
    MissingResponse,

    #[error("unknown or expired challenge, please request a new one")]
    UnknownChallenge,

    #[error("invalid CAPTCHA, please try again")]
    Mismatch,

    #[error("challenge verification failed")]
    VerificationFailed,

    #[error("challenges are not enabled on this server")]
    NotEnabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_and_encoding_errors_are_server_side() {
        assert!(!BlendError::InvalidBins(0).is_client_error());
        assert!(!BlendError::Encode(image::ImageError::Limits(
            image::error::LimitError::from_kind(image::error::LimitErrorKind::InsufficientMemory),
        ))
        .is_client_error());
    }

    #[test]
    fn request_errors_are_client_side() {
        for err in [
            BlendError::MissingImage("image1"),
            BlendError::EmptyImage("image2"),
            BlendError::DimensionMismatch(1, 2, 3, 4),
            BlendError::InvalidCoefficient("abc".to_string()),
            BlendError::CoefficientOutOfRange(1.5),
            BlendError::UnknownMethod("overlay".to_string()),
        ] {
            assert!(err.is_client_error(), "{err}");
        }
    }
}
