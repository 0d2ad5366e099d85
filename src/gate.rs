//! Challenge gate guarding the processing endpoint.
//!
//! The gate either lets every request through, checks a locally issued text
//! challenge, or asks a third-party verifier. It never touches image data and
//! a failed check means the pipeline is not run at all.

use crate::{config::GateConfig, error::GateError};
use rand::Rng;
use serde::Deserialize;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
    time::Duration,
};

const CHALLENGE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The client's answers as submitted with the form. Which fields matter depends
/// on the gate.
#[derive(Clone, Debug, Default)]
pub struct ChallengeAnswer {
    pub captcha_id: Option<String>,
    pub captcha: Option<String>,
    pub recaptcha_token: Option<String>,
}

/// A freshly issued text challenge.
#[derive(Clone, Debug)]
pub struct Challenge {
    pub id: String,
    pub text: String,
}

#[derive(Default)]
struct PendingChallenges {
    by_id: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Bounded store of outstanding text challenges. Each challenge can be
/// answered once.
pub struct CaptchaStore {
    length: usize,
    capacity: usize,
    pending: Mutex<PendingChallenges>,
}

impl CaptchaStore {
    /// `length` and `capacity` are raised to at least 1.
    pub fn new(length: usize, capacity: usize) -> Self {
        Self {
            length: length.max(1),
            capacity: capacity.max(1),
            pending: Mutex::new(PendingChallenges::default()),
        }
    }

    /// Creates and stores a new challenge, evicting the oldest one when full.
    pub fn issue(&self) -> Challenge {
        let mut rng = rand::rng();
        let text: String = (0..self.length)
            .map(|_| CHALLENGE_ALPHABET[rng.random_range(0..CHALLENGE_ALPHABET.len())] as char)
            .collect();
        let id = format!("{:032x}", rng.random::<u128>());

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.by_id.len() >= self.capacity {
            let Some(oldest) = pending.order.pop_front() else {
                break;
            };
            pending.by_id.remove(&oldest);
        }
        pending.by_id.insert(id.clone(), text.clone());
        pending.order.push_back(id.clone());

        log::debug!("Issued challenge {id}");
        Challenge { id, text }
    }

    /// Consumes the challenge and compares the answer case-insensitively.
    pub fn verify(&self, id: &str, answer: &str) -> Result<(), GateError> {
        let expected = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let expected = pending.by_id.remove(id);
            if expected.is_some() {
                pending.order.retain(|pending_id| pending_id != id);
            }
            expected
        };

        match expected {
            None => Err(GateError::UnknownChallenge),
            Some(text) if text.eq_ignore_ascii_case(answer.trim()) => Ok(()),
            Some(_) => Err(GateError::Mismatch),
        }
    }

    /// Number of challenges awaiting an answer.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }
}

#[derive(Deserialize)]
struct SiteVerifyReply {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Third-party token verification. Any failure to get a positive answer,
/// including timeouts, is treated as not authorized.
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    verify_url: String,
}

impl RecaptchaVerifier {
    pub fn new(
        secret: impl Into<String>,
        verify_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            secret: secret.into(),
            verify_url: verify_url.into(),
        })
    }

    /// Posts the token and secret to the verify URL and requires
    /// `{"success": true}` back.
    pub async fn verify(&self, token: &str) -> Result<(), GateError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GateError::MissingResponse);
        }

        match self.site_verify(token).await {
            Ok(reply) if reply.success => Ok(()),
            Ok(reply) => {
                log::warn!("Verifier rejected token: {:?}", reply.error_codes);
                Err(GateError::VerificationFailed)
            }
            Err(e) => {
                log::warn!("Verifier request failed: {e}");
                Err(GateError::VerificationFailed)
            }
        }
    }

    async fn site_verify(&self, token: &str) -> Result<SiteVerifyReply, reqwest::Error> {
        self.client
            .post(&self.verify_url)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// The check a request must pass before `/process` runs the pipeline.
pub enum ChallengeGate {
    Open,
    Captcha(CaptchaStore),
    Recaptcha(RecaptchaVerifier),
}

impl ChallengeGate {
    /// Fails only if the verifier's HTTP client cannot be built.
    pub fn from_config(config: &GateConfig) -> Result<Self, reqwest::Error> {
        Ok(match config {
            GateConfig::Open => ChallengeGate::Open,
            GateConfig::Captcha { length, capacity } => {
                ChallengeGate::Captcha(CaptchaStore::new(*length, *capacity))
            }
            GateConfig::Recaptcha {
                secret,
                verify_url,
                timeout,
            } => ChallengeGate::Recaptcha(RecaptchaVerifier::new(
                secret.as_str(),
                verify_url.as_str(),
                *timeout,
            )?),
        })
    }

    /// Name reported by `/status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeGate::Open => "open",
            ChallengeGate::Captcha(_) => "captcha",
            ChallengeGate::Recaptcha(_) => "recaptcha",
        }
    }

    /// Checks the submitted answer. Text challenges are consumed whether or
    /// not the answer matches.
    pub async fn authorize(&self, answer: &ChallengeAnswer) -> Result<(), GateError> {
        match self {
            ChallengeGate::Open => Ok(()),
            ChallengeGate::Captcha(store) => {
                let id = non_empty(&answer.captcha_id).ok_or(GateError::MissingResponse)?;
                let text = non_empty(&answer.captcha).ok_or(GateError::MissingResponse)?;
                store.verify(id, text)
            }
            ChallengeGate::Recaptcha(verifier) => {
                verifier
                    .verify(answer.recaptcha_token.as_deref().unwrap_or_default())
                    .await
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
