use crate::{
    config::ServerConfig,
    error::{BlendError, GateError},
    gate::{ChallengeAnswer, ChallengeGate},
    messages::{BlendResponse, CaptchaResponse, ErrorResponse, StatusResponse},
    pipeline::{self, Analysis, BlendForm, BlendRequest},
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

/// Whether any blend is currently running on the worker pool.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineState {
    Idle,
    Processing,
}

impl EngineState {
    /// Name reported by `/status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Processing => "processing",
        }
    }
}

/// Shared server state: configuration, the challenge gate and counters.
pub struct AppState {
    config: ServerConfig,
    gate: ChallengeGate,
    in_flight: AtomicUsize,
    completed: AtomicU64,
    rejected: AtomicU64,
}

impl AppState {
    /// Builds the gate from `config`. Fails only if the verifier's HTTP client
    /// cannot be created.
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            gate: ChallengeGate::from_config(&config.gate)?,
            config,
            in_flight: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// The challenge gate guarding `/process`.
    pub fn gate(&self) -> &ChallengeGate {
        &self.gate
    }

    /// Processing while at least one blend is in flight.
    pub fn state(&self) -> EngineState {
        if self.in_flight.load(Ordering::Relaxed) == 0 {
            EngineState::Idle
        } else {
            EngineState::Processing
        }
    }

    /// Number of blends that produced a response.
    pub fn blends_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Number of requests refused by the gate, validation or the pipeline.
    pub fn blends_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn reject(&self, err: impl Into<ApiError>) -> ApiError {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        let err = err.into();
        log::warn!("Rejected request: {}", err.message);
        err
    }

    /// Runs the pipeline on the blocking pool and encodes the response there too.
    async fn run(self: &Arc<Self>, request: BlendRequest) -> Result<BlendResponse, ApiError> {
        let state = self.clone();
        let outcome = {
            let _busy = InFlight::enter(&self.in_flight);
            tokio::task::spawn_blocking(move || {
                let result = pipeline::run(&request, &state.config.blend)?;
                BlendResponse::encode(&result, state.config.blend.histogram.mode)
            })
            .await
        };

        match outcome {
            Ok(Ok(response)) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "Blended {}x{} ({}, {})",
                    response.width,
                    response.height,
                    response.method,
                    response.blend_level
                );
                Ok(response)
            }
            Ok(Err(e)) => Err(self.reject(e)),
            Err(e) => {
                log::error!("Blend worker failed: {e}");
                Err(ApiError::internal("blend worker failed"))
            }
        }
    }
}

/// Counts a running blend until dropped, including when the request is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A failed request: status plus the message sent back as `{success: false, error}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<BlendError> for ApiError {
    fn from(err: BlendError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            log::error!("Processing error: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

/// Builds the HTTP routes around the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(|| async { "Welcome to blendum!" }))
        .route("/status", get(get_status))
        .route("/new-captcha", get(new_captcha))
        .route("/api/blend", post(api_blend))
        .route("/process", post(process))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.state().as_str().to_string(),
        gate: state.gate.as_str().to_string(),
        blends_completed: state.blends_completed(),
        blends_rejected: state.blends_rejected(),
    })
}

/// Issues a text challenge. Only available behind the captcha gate.
async fn new_captcha(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CaptchaResponse>, ApiError> {
    let ChallengeGate::Captcha(store) = &state.gate else {
        return Err(GateError::NotEnabled.into());
    };
    let challenge = store.issue();
    log::debug!("Issued challenge {}", challenge.id);
    Ok(Json(CaptchaResponse {
        success: true,
        captcha_id: challenge.id,
        captcha_text: challenge.text,
    }))
}

/// Ungated blend without histograms.
async fn api_blend(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<BlendResponse>, ApiError> {
    let (form, _) = read_form(multipart).await?;
    let request =
        BlendRequest::from_form(form, &state.config.blend).map_err(|e| state.reject(e))?;
    state.run(request).await.map(Json)
}

/// Gated blend with color distribution charts.
async fn process(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<BlendResponse>, ApiError> {
    let (form, answer) = read_form(multipart).await?;
    state
        .gate
        .authorize(&answer)
        .await
        .map_err(|e| state.reject(e))?;

    let analysis = if form.difference {
        Analysis::WithDifference
    } else {
        Analysis::Histograms
    };
    let request = BlendRequest::from_form(form, &state.config.blend)
        .map_err(|e| state.reject(e))?
        .with_analysis(analysis);
    state.run(request).await.map(Json)
}

async fn read_form(mut multipart: Multipart) -> Result<(BlendForm, ChallengeAnswer), ApiError> {
    let mut form = BlendForm::default();
    let mut answer = ChallengeAnswer::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "image1" => form.image1 = Some(field.bytes().await?.to_vec()),
            "image2" => form.image2 = Some(field.bytes().await?.to_vec()),
            "blend_level" => form.blend_level = Some(field.text().await?),
            "method" => form.method = Some(field.text().await?),
            "difference" => {
                let text = field.text().await?;
                form.difference = matches!(text.trim(), "true" | "1" | "on");
            }
            "captcha_id" => answer.captcha_id = Some(field.text().await?),
            "captcha" => answer.captcha = Some(field.text().await?),
            "g-recaptcha-response" => answer.recaptcha_token = Some(field.text().await?),
            other => log::debug!("Ignoring form field {other:?}"),
        }
    }

    Ok((form, answer))
}
