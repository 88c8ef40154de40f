use std::path::PathBuf;

use clap::Parser;

/// Submit a task signature to a Celery queue and wait until a worker picks it up.
///
/// Trailing `KEY VALUE` pairs are passed to the task as extra keyword arguments
/// and override the signature's own kwargs.
#[derive(Parser, Debug)]
#[command(name = "send-task", version, about = "Submit a task from <SIGNATURE> to <QUEUE>")]
pub struct SendTaskArgs {
    /// Signature file (JSON), `-` for stdin, or JSON text with --inline
    pub signature: String,

    /// Queue name
    pub queue: String,

    /// Extra keyword arguments as alternating KEY VALUE
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra: Vec<String>,

    /// Treat <SIGNATURE> as JSON text instead of a path
    #[arg(long)]
    pub inline: bool,

    /// Show all extra arguments as key/value pairs, e.g. port / 5555
    #[arg(short, long)]
    pub verbose: bool,

    /// File path to store the task id when the task was picked up
    #[arg(short = 'f', long)]
    pub tidfile: Option<PathBuf>,

    /// How long to wait for a worker (milliseconds)
    #[arg(long, env = "HERALD_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Delay between state polls (milliseconds)
    #[arg(long, env = "HERALD_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,
}
