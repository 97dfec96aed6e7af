//! dumpwatch waits for dated dump runs to be complete and verified, then
//! queues exactly one job per tracked entry.

pub mod config;
pub mod error;
pub mod util;

// Конфигурация типов дампов (JSON, load-once)
pub mod registry;

// Каталоги дампов: sidecar-файлы, SHA-1, кэш на прогон
pub mod dumpdir;
pub mod locator;

// История (.dumpsrc) и очередь заданий
pub mod entry;
pub mod store;
pub mod lock;

pub mod report;
pub mod watcher;

// Удобные реэкспорты
pub use config::WatchConfig;
pub use dumpdir::{DirCache, DumpDirectory, FileSet};
pub use entry::TrackedEntry;
pub use error::{EntryError, RegistryError, SidecarError};
pub use locator::{list_candidates, Candidate};
pub use registry::{DumpRegistry, DumpTypeConfig};
pub use report::RunReport;
pub use store::EntryStore;
pub use watcher::DumpWatcher;
