use clap::Parser;
use std::path::PathBuf;

/// dumpwatch: check tracked entries against new dump runs and queue jobs
#[derive(Parser, Debug)]
#[command(name = "dumpwatch", version, about = "Dump availability watcher and job queuer")]
pub struct Cli {
    /// Ad-hoc entry in history-line form, e.g.
    ///   dumpwatch "project=plwiki; date=20240101; dumptypes=articlesdump; script=./job.sh"
    /// Without it every entry of the history file is processed.
    pub entry: Vec<String>,

    /// History file (env DUMPWATCH_HISTORY, default ./.dumpsrc)
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Pending job queue (env DUMPWATCH_PENDING, default ./dumps_pending)
    #[arg(long)]
    pub pending: Option<PathBuf>,

    /// Parent of project dump directories (env DUMPWATCH_DUMPS_ROOT)
    #[arg(long)]
    pub dumps_root: Option<PathBuf>,

    /// Dump-type config JSON (env DUMPWATCH_DUMP_CONFIG, default: bundled)
    #[arg(long)]
    pub dump_config: Option<PathBuf>,

    /// Threads for checksum verification of one candidate
    #[arg(long)]
    pub workers: Option<usize>,

    /// Resolve and verify, but do not touch history or queue
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Only validate the dump-type config (fallback chains) and exit
    #[arg(long, default_value_t = false)]
    pub check_config: bool,
}
