use anyhow::{Context, Result};
use chrono::Local;
use log::info;

use dumpwatch::{DumpWatcher, EntryStore, TrackedEntry, WatchConfig};

/// Batch run over the history file, or a single ad-hoc entry when `args` is
/// not empty (args are joined with spaces and parsed as a history line).
pub fn exec(cfg: &WatchConfig, args: Vec<String>, json: bool) -> Result<()> {
    info!("dumpwatch: starting run at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("dumpwatch: {}", cfg);

    let watcher = DumpWatcher::from_config(cfg)?;
    let store = EntryStore::new(cfg.history_path.clone(), cfg.pending_path.clone());

    let report = if args.is_empty() {
        watcher.run_batch(&store)?
    } else {
        let line = args.join(" ");
        let entry = TrackedEntry::parse_line(&line)
            .with_context(|| format!("ad-hoc entry '{}'", line))?;
        let (entry, report) = watcher.run_single(&store, entry)?;
        if entry.updated {
            info!("dumpwatch: ad-hoc entry resolved to {}", entry);
        }
        report
    };

    if json {
        println!("{}", report.to_json());
    } else {
        println!("{}", report);
    }
    Ok(())
}
