use argh::FromArgs;
use blendum::{
    AlphaPolicy, AppState, BlendConfig, GateConfig, HistogramConfig, HistogramMode, MethodPolicy,
    ServerConfig, config::RECAPTCHA_VERIFY_URL,
};
use std::{sync::Arc, time::Duration};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

#[derive(FromArgs)]
/// Blendum serves two-image blending with color histograms.
struct BlenddArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// challenge guarding /process: "open", "captcha" or "recaptcha"
    #[argh(option, default = "String::from(\"captcha\")")]
    gate: String,

    /// what to do with blend levels outside [0, 1]: "reject" or "clamp"
    #[argh(option, default = "AlphaPolicy::Reject")]
    alpha_policy: AlphaPolicy,

    /// what to do with unknown methods: "reject" or "fallback"
    #[argh(option, default = "MethodPolicy::Reject")]
    method_policy: MethodPolicy,

    /// number of histogram bins (1-256)
    #[argh(option, default = "256")]
    bins: usize,

    /// plot histogram density instead of raw counts
    #[argh(switch)]
    density: bool,

    /// secret for the third-party verifier (or BLENDUM_RECAPTCHA_SECRET)
    #[argh(option)]
    recaptcha_secret: Option<String>,

    /// verification endpoint of the third-party verifier
    #[argh(option, default = "RECAPTCHA_VERIFY_URL.to_string()")]
    recaptcha_url: String,

    /// verifier timeout in milliseconds
    #[argh(option, default = "10_000")]
    recaptcha_timeout_ms: u64,
}

impl BlenddArgs {
    fn server_config(&self) -> Result<ServerConfig, String> {
        let histogram = HistogramConfig {
            bins: self.bins,
            mode: if self.density {
                HistogramMode::Density
            } else {
                HistogramMode::Count
            },
        };
        histogram.validate().map_err(|e| e.to_string())?;

        let gate = match self.gate.as_str() {
            "open" => GateConfig::Open,
            "captcha" => GateConfig::default(),
            "recaptcha" => {
                let secret = self
                    .recaptcha_secret
                    .clone()
                    .or_else(|| std::env::var("BLENDUM_RECAPTCHA_SECRET").ok())
                    .ok_or("the recaptcha gate needs --recaptcha-secret")?;
                GateConfig::Recaptcha {
                    secret,
                    verify_url: self.recaptcha_url.clone(),
                    timeout: Duration::from_millis(self.recaptcha_timeout_ms),
                }
            }
            other => return Err(format!("unknown gate {other:?}")),
        };

        Ok(ServerConfig {
            blend: BlendConfig {
                alpha_policy: self.alpha_policy,
                method_policy: self.method_policy,
                histogram,
                ..Default::default()
            },
            gate,
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: BlenddArgs = argh::from_env();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let state = Arc::new(AppState::new(args.server_config()?)?);
    log::info!("🔒 Gate: {}", state.gate().as_str());
    let app = blendum::router(state);

    log::info!("🚀 Starting the server");
    log::info!("🔥 Listening on: {}", addr);
    log::info!("🔧 Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
