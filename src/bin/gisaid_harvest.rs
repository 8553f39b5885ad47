use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gisaid_harvest::browser::{Session, SessionOptions};
use gisaid_harvest::domain::RunSummary;
use gisaid_harvest::error::HarvestError;
use gisaid_harvest::harvest::{Credentials, Harvester};
use gisaid_harvest::output::JsonOutput;
use gisaid_harvest::store::OutputStore;

#[derive(Parser)]
#[command(name = "gisaid-harvest")]
#[command(about = "Harvest EpiCoV genome records and sample metadata through a live browser")]
#[command(version, author)]
struct Cli {
    #[arg(long, env = "GISAID_USERNAME")]
    username: String,

    #[arg(long, env = "GISAID_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, default_value = "fastas")]
    destination: Utf8PathBuf,

    #[arg(long, default_value = "http://localhost:4444")]
    webdriver_url: String,

    #[arg(long)]
    headless: bool,

    #[arg(long)]
    include_partial: bool,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(harvest) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(harvest));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::Connect { .. } | HarvestError::Browser(_) => 3,
        HarvestError::MissingElement(_)
        | HarvestError::LoginStuck(_)
        | HarvestError::TotalCount(_) => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let credentials = Credentials {
        username: cli.username,
        password: cli.password,
    };

    let store = OutputStore::open(cli.destination).into_diagnostic()?;
    info!(
        destination = store.destination().as_str(),
        on_disk = store.downloaded_count(),
        "output store ready"
    );

    let session = Session::open(&SessionOptions {
        webdriver_url: cli.webdriver_url,
        headless: cli.headless,
    })
    .await
    .into_diagnostic()?;
    let mut harvester = Harvester::new(session, store, !cli.include_partial);

    harvester.login(&credentials).await.into_diagnostic()?;
    harvester.open_listing().await.into_diagnostic()?;

    let mut summary = RunSummary::started();
    let outcome = drive(&mut harvester, &mut summary).await;
    summary.finish();

    if let Err(err) = harvester.close().await {
        warn!(%err, "browser session did not shut down cleanly");
    }

    if cli.json {
        JsonOutput::print_summary(&summary).into_diagnostic()?;
    } else {
        print_summary(&summary);
    }
    outcome.into_diagnostic()?;
    Ok(())
}

async fn drive(
    harvester: &mut Harvester,
    summary: &mut RunSummary,
) -> Result<(), HarvestError> {
    loop {
        let outcomes = harvester.download_current_page().await?;
        summary.absorb(&outcomes);
        if harvester.finished() {
            info!(pages = summary.pages, "every known sample is on disk");
            return Ok(());
        }
        if let Err(err) = harvester.next_page().await {
            error!(%err, "pagination stopped before the sample count was reached");
            return Err(err);
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} pages visited: {} downloaded, {} skipped, {} failed",
        summary.pages, summary.downloaded, summary.skipped, summary.failed
    );
    if summary.short_sequences > 0 {
        println!(
            "{} sequences were shorter than a whole genome; rerun to recapture them",
            summary.short_sequences
        );
    }
    for failure in &summary.failures {
        println!("  failed {failure}");
    }
}
