use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facegate", about = "facegate face enrollment and authentication CLI")]
struct Cli {
    /// Base URL of the facegated server
    #[arg(long, env = "FACEGATE_SERVER", default_value = "http://127.0.0.1:5000", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a person from one or more photos (only the last is used)
    Enroll {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        age: String,
        /// Photo files
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Authenticate a photo against enrolled identities
    Authenticate {
        image: PathBuf,
        /// Number of nearest candidates to request
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show server status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.server.trim_end_matches('/');

    let request = match cli.command {
        Commands::Enroll {
            first_name,
            last_name,
            age,
            images,
        } => {
            let mut form = Form::new()
                .text("firstName", first_name)
                .text("lastName", last_name)
                .text("age", age);
            for path in &images {
                form = form.part("images", file_part(path).await?);
            }
            client.post(format!("{base}/enroll")).multipart(form)
        }
        Commands::Authenticate { image, top_k } => {
            let mut form = Form::new().part("image", file_part(&image).await?);
            if let Some(k) = top_k {
                form = form.text("top_k", k.to_string());
            }
            client.post(format!("{base}/authenticate")).multipart(form)
        }
        Commands::Status => client.get(format!("{base}/status")),
    };

    tracing::debug!(server = base, "sending request");
    let response = request
        .send()
        .await
        .with_context(|| format!("facegated not reachable at {base}"))?;
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("server returned a non-JSON response")?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        anyhow::bail!("server returned {status}");
    }
    Ok(())
}

async fn file_part(path: &Path) -> Result<Part> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(data).file_name(name))
}
