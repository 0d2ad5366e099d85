use argh::FromArgs;
use base64::{Engine, engine::general_purpose::STANDARD};
use blendum::messages::{BlendResponse, ErrorResponse};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5000;

#[derive(FromArgs)]
/// Blendum client for blending images and checking the server
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "blend" or "status"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Blend(BlendCommand),
    Status(StatusCommand),
}

#[derive(FromArgs)]
/// Blend two images through the ungated endpoint
#[argh(subcommand, name = "blend")]
struct BlendCommand {
    /// the first image, weighted by the blend level
    #[argh(option)]
    image1: PathBuf,

    /// the second image
    #[argh(option)]
    image2: PathBuf,

    /// blend level between 0 and 1
    #[argh(option, short = 'l', default = "0.5")]
    level: f32,

    /// blend method: linear, multiply or screen
    #[argh(option, short = 'm', default = "String::from(\"linear\")")]
    method: String,

    /// where to write the blended PNG
    #[argh(option, short = 'o', default = "PathBuf::from(\"blended_result.png\")")]
    output: PathBuf,
}

#[derive(FromArgs)]
/// Show server status
#[argh(subcommand, name = "status")]
struct StatusCommand {}

async fn file_part(path: &Path) -> Result<Part, Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    Ok(Part::bytes(tokio::fs::read(path).await?).file_name(name))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Blend(blend) => {
            let form = Form::new()
                .part("image1", file_part(&blend.image1).await?)
                .part("image2", file_part(&blend.image2).await?)
                .text("blend_level", blend.level.to_string())
                .text("method", blend.method);

            let response = client
                .post(format!("http://{}/api/blend", addr))
                .multipart(form)
                .send()
                .await?;

            if !response.status().is_success() {
                let error = response.json::<ErrorResponse>().await?;
                println!("Error: {}", error.error);
                return Ok(());
            }

            let result = response.json::<BlendResponse>().await?;
            tokio::fs::write(&blend.output, STANDARD.decode(result.blended_image)?).await?;
            println!(
                "Success! {}x{} result saved as {}",
                result.width,
                result.height,
                blend.output.display()
            );
        }
        ClientCommands::Status(_) => {
            let response = client
                .get(format!("http://{}/status", addr))
                .send()
                .await?;

            let result = response.json::<serde_json::Value>().await?;
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
