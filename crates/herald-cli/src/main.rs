mod cli;
mod exit;
mod extras;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use herald_core::app::{Settings, SignatureSource, load_signature, parse_signature_reader};
use herald_core::domain::{
    QueueName, SignatureError, SubmissionOutcome, SubmissionRequest, TrackingRecord,
};
use herald_core::impls::{FileTrackingStore, RedisBroker};
use herald_core::ports::TrackingStore;
use herald_core::{HeraldError, SubmissionCoordinator, TaskDescriptor};

use crate::cli::SendTaskArgs;
use crate::exit::SysExit;

#[tokio::main]
async fn main() -> ExitCode {
    // .env を先に読むので HERALD_LOG も .env で指定できる
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("HERALD_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = SendTaskArgs::parse();
    run(args).await.into()
}

/// Everything checked before the broker is contacted.
struct Submission {
    settings: Settings,
    request: SubmissionRequest,
    tidfile: Option<PathBuf>,
}

async fn run(args: SendTaskArgs) -> SysExit {
    let submission = match prepare(&args, |key| std::env::var(key).ok()).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let broker = match RedisBroker::connect(
        &submission.settings.broker_url,
        &submission.settings.result_backend,
    )
    .await
    {
        Ok(b) => b,
        Err(e) => return fail(&HeraldError::Broker(e)),
    };
    let coordinator = SubmissionCoordinator::new(Arc::new(broker));

    // Ctrl-C は待機を打ち切って revoke させる
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; revoking the pending task");
            on_interrupt.cancel();
        }
    });

    deliver(&coordinator, &submission, &cancel).await
}

/// (A) 末尾の KEY VALUE -> (B) 環境変数 -> (C) signature -> (D) queue の順に検証する
async fn prepare(
    args: &SendTaskArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Submission, SysExit> {
    let pairs = extras::pair_extras(&args.extra).map_err(|e| {
        error!("Keyword and value counts do not match: {e}. Abort");
        SysExit::Config
    })?;
    if args.verbose {
        for (i, (key, value)) in pairs.iter().enumerate() {
            info!("{}. Keyword//Value: {} // {}", i + 1, key, value);
        }
    }

    let settings = Settings::from_lookup(lookup).map_err(|e| fail(&e))?;
    let descriptor = read_signature(args).await.map_err(|e| fail(&e))?;
    let queue = QueueName::new(args.queue.as_str()).map_err(|e| {
        error!("{e}");
        SysExit::Usage
    })?;

    let mut request = SubmissionRequest::new(queue, descriptor)
        .with_extra_arguments(extras::into_arguments(pairs));
    if let Some(ms) = args.timeout_ms {
        request = request.with_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.poll_interval_ms {
        request = request.with_poll_interval(Duration::from_millis(ms));
    }

    Ok(Submission {
        settings,
        request,
        tidfile: args.tidfile.clone(),
    })
}

/// Submit, then record the task id when a worker picked it up.
async fn deliver(
    coordinator: &SubmissionCoordinator,
    submission: &Submission,
    cancel: &CancellationToken,
) -> SysExit {
    let outcome = coordinator
        .submit_with_cancel(&submission.request, cancel)
        .await;
    match &outcome {
        SubmissionOutcome::Confirmed { task_id } => {
            println!("{task_id}");
            if let Some(path) = &submission.tidfile {
                let record =
                    TrackingRecord::new(task_id.clone(), submission.request.queue_name().clone());
                if let Err(e) = FileTrackingStore::new(path).save(&record).await {
                    return fail(&e);
                }
                info!(path = %path.display(), "tracking record written");
            }
        }
        SubmissionOutcome::TimedOut { task_id, revoke } => {
            error!(task_id = %task_id, revoke = ?revoke, "task was not picked up in time");
        }
        SubmissionOutcome::Rejected { reason } => {
            error!("broker rejected the task: {reason}");
        }
    }
    exit::for_outcome(&outcome)
}

/// ファイル / stdin の読み込みはブロッキングなので runtime の外で行う
async fn read_signature(args: &SendTaskArgs) -> Result<TaskDescriptor, HeraldError> {
    let source = if args.inline {
        Some(SignatureSource::Inline(args.signature.clone()))
    } else if args.signature == "-" {
        None
    } else {
        Some(SignatureSource::File(args.signature.clone().into()))
    };

    tokio::task::spawn_blocking(move || match source {
        Some(source) => load_signature(&source),
        None => parse_signature_reader(std::io::stdin().lock()),
    })
    .await
    .map_err(|e| SignatureError::Stream(std::io::Error::other(e)))?
}

fn fail(err: &HeraldError) -> SysExit {
    error!("{err}");
    exit::for_error(err)
}
