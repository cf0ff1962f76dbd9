//! Control Report CLI - renders case reports from a directory of case files.

mod sources;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use control_report_core::{
    AttachmentStore, NoAttachments, ReportConfig, ReportGenerator, ReportPipeline,
};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::sources::{DirectoryAttachments, DirectoryCases};

#[derive(Parser, Debug)]
#[command(name = "control-report")]
#[command(author, version, about = "Generate operational control case reports", long_about = None)]
struct Args {
    /// Case identifiers to render
    #[arg(required = true)]
    ids: Vec<u32>,

    /// Directory holding `<id>.json` case records
    #[arg(long, env = "CONTROL_REPORT_CASES_DIR", default_value = "cases")]
    cases_dir: PathBuf,

    /// Directory holding one `<id>/` attachment folder per case
    #[arg(long, env = "CONTROL_REPORT_ATTACHMENTS_DIR", default_value = "attachments")]
    attachments_dir: PathBuf,

    /// Where reports are written
    #[arg(short, long, env = "CONTROL_REPORT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Directory containing the institutional logo
    #[arg(long, env = "CONTROL_REPORT_ASSET_ROOT")]
    asset_root: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render the base report only
    #[arg(long)]
    no_attachments: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn render_one(pipeline: &ReportPipeline, id: u32, output_dir: &Path) -> Result<PathBuf> {
    let report = pipeline
        .render(id)
        .await
        .with_context(|| format!("Failed to render case {id}"))?;

    let path = output_dir.join(&report.filename);
    tokio::fs::write(&path, &report.bytes)
        .await
        .with_context(|| format!("Failed to write output: {}", path.display()))?;

    for warning in &report.warnings {
        info!(case_id = id, "{warning}");
    }
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let mut args = Args::parse();
    init_logging(args.verbose);

    let config = if let Some(config_path) = &args.config {
        ReportConfig::from_file(config_path)
            .context("Failed to load config file")?
            .with_env_overrides()
    } else {
        ReportConfig::load()
    }
    .with_asset_root_override(args.asset_root.clone());

    let generator = ReportGenerator::new(config).context("Failed to initialize report generator")?;
    let attachments: Arc<dyn AttachmentStore> = if args.no_attachments {
        Arc::new(NoAttachments)
    } else {
        Arc::new(DirectoryAttachments::new(&args.attachments_dir))
    };
    let pipeline = ReportPipeline::new(
        Arc::new(generator),
        Arc::new(DirectoryCases::new(&args.cases_dir)),
        attachments,
    );

    std::fs::create_dir_all(&args.output_dir).context(format!(
        "Failed to create output directory: {}",
        args.output_dir.display()
    ))?;

    args.ids.sort_unstable();
    args.ids.dedup();

    let pb = ProgressBar::new(u64::try_from(args.ids.len()).unwrap_or(u64::MAX));
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let results = join_all(args.ids.iter().map(|&id| {
        let pipeline = &pipeline;
        let pb = &pb;
        let output_dir = args.output_dir.as_path();
        async move {
            let result = render_one(pipeline, id, output_dir).await;
            pb.set_message(format!("case {id}"));
            pb.inc(1);
            (id, result)
        }
    }))
    .await;

    pb.finish_and_clear();

    let mut failed = 0;
    for (id, result) in results {
        match result {
            // CLI output is intentional
            #[allow(clippy::print_stdout)]
            Ok(path) => println!("Case {id}: {}", path.display()),
            Err(e) => {
                error!("{e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} reports failed", args.ids.len());
    }
    Ok(())
}
