//! Two-image blending service.
//!
//! Two uploaded images are resized to their common (minimum) dimensions,
//! blended channel by channel and optionally analysed into per-channel color
//! histograms. [`pipeline::run`] is the synchronous core; [`server::router`]
//! exposes it over HTTP behind an optional [`gate::ChallengeGate`].

pub mod blend;
pub mod chart;
pub mod config;
pub mod error;
pub mod gate;
pub mod histogram;
pub mod messages;
pub mod pipeline;
pub mod raster;
pub mod server;

pub use blend::{AlphaPolicy, BlendMethod, MethodPolicy};
pub use config::{BlendConfig, GateConfig, ServerConfig};
pub use error::{BlendError, GateError};
pub use gate::{ChallengeAnswer, ChallengeGate};
pub use histogram::{HistogramConfig, HistogramMode, ImageHistogram};
pub use pipeline::{Analysis, BlendRequest, BlendResult};
pub use server::{AppState, router};
