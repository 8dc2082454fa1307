use std::path::PathBuf;

use clap::Parser;
use etltools::config::ObservabilityConfig;
use etltools::release::{run_release, ReleaseOptions, ReleaseTokens};

/// Incrementa o patch do manifest, faz commit/push e publica o pacote
#[derive(Parser)]
#[command(name = "release", version)]
struct Cli {
    /// Manifest cujo `version` será incrementado
    #[arg(long, default_value = "Cargo.toml")]
    manifest: PathBuf,

    /// Arquivo dotenv com os tokens de publicação
    #[arg(long, default_value = ".env")]
    env: PathBuf,

    /// Registry de teste publicado antes do principal
    #[arg(long)]
    test_registry: Option<String>,

    /// Apenas lista os passos, sem alterar nada
    #[arg(long)]
    dry_run: bool,

    /// Para após o push
    #[arg(long)]
    skip_publish: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Arquivo .env é opcional
    let _ = dotenvy::from_path(&cli.env);

    etltools::logging::init(&ObservabilityConfig::default())?;

    let opts = ReleaseOptions {
        manifest: cli.manifest,
        test_registry: cli.test_registry,
        skip_publish: cli.skip_publish,
        dry_run: cli.dry_run,
    };

    let report = run_release(&opts, &ReleaseTokens::from_env()).await?;
    println!("{}", report.version);
    Ok(())
}
