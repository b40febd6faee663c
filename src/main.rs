use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use apple_counter::models::job::JobResult;
use apple_counter::models::notification::{Notification, Severity};
use apple_counter::models::session::SessionState;
use apple_counter::services::analysis::AnalysisClient;
use apple_counter::services::intake;
use apple_counter::services::notify::ChannelNotifier;
use apple_counter::{AppConfig, Session};
use clap::Parser;
use garde::Validate;
use tracing_subscriber::EnvFilter;

/// Count the apples in a video of your apple trees.
#[derive(Debug, Parser)]
#[command(name = "apple-counter", version, about)]
struct Cli {
    /// Video to analyse (MP4, MOV, AVI).
    video: Option<PathBuf>,

    /// Override the upload endpoint.
    #[arg(long)]
    submit_url: Option<String>,

    /// Override the job status base URL.
    #[arg(long)]
    status_base_url: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so the progress and result output stays readable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = AppConfig::from_env().expect("Failed to load configuration from environment");
    if let Some(url) = cli.submit_url {
        config.submit_url = url;
    }
    if let Some(url) = cli.status_base_url {
        config.status_base_url = url;
    }
    if let Err(report) = config.validate() {
        eprintln!("Invalid configuration: {report}");
        return ExitCode::FAILURE;
    }

    describe_metrics();

    let client = AnalysisClient::new(
        &config.submit_url,
        &config.status_base_url,
        config.request_timeout(),
    )
    .expect("Failed to initialize HTTP client");

    let (notifier, mut notifications) = ChannelNotifier::new();
    let notifier = Arc::new(notifier);

    let selection: Vec<PathBuf> = cli.video.into_iter().collect();
    let video = match intake::load_video(&selection, notifier.as_ref()).await {
        Ok(video) => video,
        Err(_) => {
            while let Ok(n) = notifications.try_recv() {
                render_notification(&n);
            }
            return ExitCode::FAILURE;
        }
    };

    let session = Session::new(Arc::new(client), notifier, config.session_config());
    tracing::info!(session_id = %session.id(), "Session started");

    let mut updates = session.subscribe();
    session.start_upload(video);

    let mut watchdog = tokio::time::interval(config.watchdog_period());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_line = String::new();
    let final_state = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break session.state();
                }
                let state = updates.borrow_and_update().clone();
                let line = progress_line(&state);
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
                if state.is_terminal() {
                    break state;
                }
            }
            Some(n) = notifications.recv() => render_notification(&n),
            _ = watchdog.tick() => {
                session.ensure_polling();
            }
            _ = &mut ctrl_c => {
                session.reset();
                eprintln!("Cancelled");
                return ExitCode::from(130);
            }
        }
    };

    while let Ok(n) = notifications.try_recv() {
        render_notification(&n);
    }

    match final_state {
        SessionState::Completed { result, .. } => {
            match result {
                Some(result) => render_result(&result),
                None => println!("Analysis finished but no results were found"),
            }
            ExitCode::SUCCESS
        }
        _ => ExitCode::FAILURE,
    }
}

fn describe_metrics() {
    metrics::describe_counter!("video_uploads_total", "Videos submitted for analysis");
    metrics::describe_counter!("video_uploads_failed_total", "Video submissions that failed");
    metrics::describe_counter!("status_polls_total", "Job status checks performed");
    metrics::describe_counter!(
        "status_poll_failures_total",
        "Job status checks that could not reach the service"
    );
    metrics::describe_counter!("jobs_completed_total", "Analysis jobs that completed");
    metrics::describe_counter!("jobs_failed_total", "Analysis jobs reported as failed");
    metrics::describe_gauge!(
        "status_poll_delay_ms",
        "Delay before the next job status check"
    );
}

fn progress_line(state: &SessionState) -> String {
    let (title, detail) = state.headline();
    match state {
        SessionState::Uploading { .. } | SessionState::Processing { .. } => {
            format!("[{title}] {detail} - {}%", state.progress())
        }
        _ => format!("[{title}] {detail}"),
    }
}

fn render_notification(n: &Notification) {
    let marker = match n.severity {
        Severity::Info => "i",
        Severity::Success => "+",
        Severity::Warning => "!",
        Severity::Error => "x",
    };
    eprintln!("({marker}) {}: {}", n.title, n.description);
}

fn render_result(result: &JobResult) {
    println!();
    println!("Results Ready");
    println!("  Apples found:      {}", result.apple_count);
    println!(
        "  Frames processed:  {} / {} ({}%)",
        result.frames_processed,
        result.total_frames,
        result.frame_progress_percent()
    );
}
