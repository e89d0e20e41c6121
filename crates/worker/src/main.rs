use anyhow::Context;
use clap::Parser;
use heat_core::config::{HeatProfile, Settings};
use heat_core::ingest::{HttpJsonProvider, RecordSource, RetryPolicy};
use heat_core::pipeline::HeatCheck;
use heat_core::storage::{ChartSink, CsvChartSink, FileReportSink, ReportSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "heat_worker")]
struct Args {
    /// JSON run profile. Built-in defaults are used when omitted.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Holding symbol; repeat to replace the profile's watchlist.
    #[arg(long = "holding")]
    holdings: Vec<String>,

    /// First date of the price window (YYYY-MM-DD). Defaults to end date minus the lookback.
    #[arg(long)]
    start_date: Option<String>,

    /// Last date of the price window (YYYY-MM-DD). Defaults to the latest China trading date.
    #[arg(long)]
    end_date: Option<String>,

    /// Overrides HEAT_OUTPUT_DIR.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Print the report without writing the report or chart files.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(args, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "heat check run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: Args, settings: &Settings) -> anyhow::Result<()> {
    let mut profile = match &args.profile {
        Some(path) => HeatProfile::load(path)?,
        None => HeatProfile::default(),
    };
    if !args.holdings.is_empty() {
        profile.holdings = args.holdings.clone();
    }
    profile.validate().context("invalid run profile")?;

    let now = chrono::Utc::now();
    let generated_at = heat_core::time::cn_market::market_now(now)?;
    let end = heat_core::time::cn_market::resolve_trade_date(args.end_date.as_deref(), now)?;
    let start = args
        .start_date
        .as_deref()
        .map(|s| {
            chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid --start-date {s:?}, expected YYYY-MM-DD"))
        })
        .transpose()?;

    let source: Arc<dyn RecordSource> = Arc::new(HttpJsonProvider::from_settings(settings)?);
    let retry = RetryPolicy::from_env();
    let holdings = profile.holdings.clone();
    let check = HeatCheck::new(profile, source, retry);
    let range = check.date_range(start, end)?;

    let out_dir = args.out_dir.clone().unwrap_or_else(|| settings.output_dir());
    let charts = CsvChartSink::new(&out_dir);
    let chart_sink: Option<&dyn ChartSink> = if args.dry_run {
        None
    } else {
        Some(&charts as &dyn ChartSink)
    };

    tracing::info!(
        start = %range.start,
        end = %range.end,
        holdings = holdings.len(),
        dry_run = args.dry_run,
        out_dir = %out_dir.display(),
        "heat check run"
    );

    let result = check.run(&holdings, range, generated_at, chart_sink).await;

    println!("{}", result.report.finalize());

    if args.dry_run {
        tracing::info!(dry_run = true, "report not written");
        return Ok(());
    }

    let path = FileReportSink::new(&out_dir)
        .write_report(&result.report, result.generated_at)
        .context("failed to persist report")?;
    tracing::info!(
        path = %path.display(),
        composite = result.scores.composite,
        tier = %result.scores.tier,
        "heat check complete"
    );
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
