// tests/watcher_runs.rs
//
// Полные прогоны DumpWatcher поверх дерева <root>/dumps/<project>/<yyyyMMdd>:
// - rolldown / norolldown, пропуск неготовых и битых кандидатов;
// - persist: очередь дописывается, история переписывается только при изменениях;
// - фатальные ошибки не оставляют частичных записей.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chrono::NaiveDate;

use dumpwatch::dumpdir::sha1_file_hex;
use dumpwatch::{
    DirCache, DumpRegistry, DumpWatcher, EntryStore, RegistryError, RunReport, TrackedEntry,
    WatchConfig,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("dwtest-watch-{prefix}-{pid}-{t}-{id}"))
}

const CONFIG: &str = r#"{
    "pages":     {"name": "pages-articles", "exts": ["xml", "bz2"]},
    "links":     {"name": "pagelinks", "exts": ["sql", "gz"], "statusfallback": "pages"},
    "meta":      {"name": "pages-meta", "exts": ["xml", "bz2"], "multi": true, "dumpfallback": "recombine"},
    "recombine": {"name": "pages-meta-all", "exts": ["xml", "bz2"]},
    "history":   {"name": "pages-history", "exts": ["xml", "7z"], "multi": true},
    "loopa":     {"name": "a", "exts": ["gz"], "statusfallback": "loopb"},
    "loopb":     {"name": "b", "exts": ["gz"], "statusfallback": "loopa"}
}"#;

struct Fixture {
    root: PathBuf,
    dumps: PathBuf,
    history: PathBuf,
    pending: PathBuf,
}

impl Fixture {
    fn new(prefix: &str) -> Result<Self> {
        let root = unique_root(prefix);
        let dumps = root.join("dumps");
        fs::create_dir_all(&dumps)?;
        Ok(Self {
            history: root.join(".dumpsrc"),
            pending: root.join("dumps_pending"),
            dumps,
            root,
        })
    }

    fn cfg(&self) -> WatchConfig {
        WatchConfig::default()
            .with_dumps_root(&self.dumps)
            .with_history_path(&self.history)
            .with_pending_path(&self.pending)
    }

    fn watcher(&self, cfg: &WatchConfig) -> Result<DumpWatcher> {
        Ok(DumpWatcher::new(DumpRegistry::from_json(CONFIG)?, cfg))
    }

    fn store(&self) -> EntryStore {
        EntryStore::new(&self.history, &self.pending)
    }

    fn write_history(&self, lines: &[&str]) -> Result<()> {
        let mut s = String::from("# tracked dumps\n\n");
        for l in lines {
            s.push_str(l);
            s.push('\n');
        }
        fs::write(&self.history, s)?;
        Ok(())
    }

    /// Dump run with status lines and files; every file gets a correct sha1.
    fn dump(&self, project: &str, stamp: &str, statuses: &[(&str, &str)], files: &[&str]) -> Result<PathBuf> {
        let dir = self.dumps.join(project).join(stamp);
        fs::create_dir_all(&dir)?;
        let mut info = String::new();
        for (name, status) in statuses {
            info.push_str(&format!("name:{name}; status:{status}; updated:2024-01-15 08:00:00\n"));
        }
        fs::write(dir.join("dumpruninfo.txt"), info)?;
        let mut sums = String::new();
        for f in files {
            let p = dir.join(f);
            fs::write(&p, format!("<mediawiki>{project}/{stamp}/{f}</mediawiki>"))?;
            sums.push_str(&format!("{} {}\n", sha1_file_hex(&p)?, f));
        }
        fs::write(dir.join(format!("{project}-{stamp}-sha1sums.txt")), sums)?;
        Ok(fs::canonicalize(dir)?)
    }
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y%m%d").unwrap()
}

#[test]
fn rolldown_picks_newest_ready_dump() -> Result<()> {
    let fx = Fixture::new("scenario-a")?;
    fx.dump("plwiki", "20240108", &[("pages", "waiting")], &["plwiki-20240108-pages-articles.xml.bz2"])?;
    let ready = fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    // older than the cursor: must never be considered
    fx.dump("plwiki", "20231220", &[("pages", "done")], &["plwiki-20231220-pages-articles.xml.bz2"])?;
    fs::create_dir_all(fx.dumps.join("plwiki").join("latest"))?;
    fs::create_dir_all(fx.dumps.join("plwiki").join("tmp-rsync"))?;

    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages; script=./job.sh"])?;

    let cfg = fx.cfg();
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;

    assert_eq!(report.entries_total, 1);
    assert_eq!(report.entries_updated, 1);
    assert_eq!(report.candidates_seen, 1, "newest candidate is ready, loop stops there");
    assert!(report.history_written);
    assert_eq!(report.jobs_queued, 1);

    let history = fs::read_to_string(&fx.history)?;
    assert_eq!(history, "project=plwiki; date=20240115; dumptypes=pages; script=./job.sh\n");

    let pending = fs::read_to_string(&fx.pending)?;
    let expected = format!(
        "./job.sh {}\n",
        ready.join("plwiki-20240115-pages-articles.xml.bz2").display()
    );
    assert_eq!(pending, expected);
    Ok(())
}

#[test]
fn rolldown_skips_waiting_newest_dump() -> Result<()> {
    let fx = Fixture::new("rolldown")?;
    fx.dump("plwiki", "20240115", &[("pages", "waiting")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    let older = fx.dump("plwiki", "20240108", &[("pages", "done")], &["plwiki-20240108-pages-articles.xml.bz2"])?;
    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages; script=./job.sh"])?;

    let cfg = fx.cfg();
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;
    assert_eq!(report.candidates_seen, 2);
    assert_eq!(report.candidates_not_ready, 1);
    assert_eq!(report.entries_updated, 1);

    let entries = fx.store().load()?;
    assert_eq!(entries[0].date, d("20240108"));
    let pending = fs::read_to_string(&fx.pending)?;
    assert!(pending.contains(&older.display().to_string()));
    Ok(())
}

#[test]
fn norolldown_only_looks_at_newest_dump() -> Result<()> {
    let fx = Fixture::new("norolldown")?;
    fx.dump("plwiki", "20240115", &[("pages", "waiting")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fx.dump("plwiki", "20240108", &[("pages", "done")], &["plwiki-20240108-pages-articles.xml.bz2"])?;
    let line = "project=plwiki; date=20240101; dumptypes=pages; norolldown; script=./job.sh";
    fx.write_history(&[line])?;
    let before = fs::read(&fx.history)?;

    let cfg = fx.cfg();
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;
    assert_eq!(report.candidates_seen, 1);
    assert!(!report.any_updated());
    assert_eq!(fs::read(&fx.history)?, before);
    assert!(!fx.pending.exists());
    Ok(())
}

#[test]
fn nothing_ready_is_a_pure_noop() -> Result<()> {
    let fx = Fixture::new("noop")?;
    for stamp in ["20240108", "20240115", "20240122"] {
        let file = format!("plwiki-{stamp}-pages-articles.xml.bz2");
        fx.dump("plwiki", stamp, &[("pages", "in-progress")], &[file.as_str()])?;
    }
    fx.write_history(&[
        "project=plwiki; date=20240101; dumptypes=pages; script=./job.sh",
        "project=plwiki; date=20240122; dumptypes=pages",
    ])?;
    let before = fs::read(&fx.history)?;

    let cfg = fx.cfg();
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;
    assert_eq!(report.entries_total, 2);
    assert_eq!(report.candidates_seen, 3);
    assert_eq!(report.candidates_not_ready, 3);
    assert_eq!(report, RunReport { entries_total: 2, candidates_seen: 3, candidates_not_ready: 3, ..RunReport::default() });

    // история не переписана (комментарии и пустые строки на месте), очередь не создана
    assert_eq!(fs::read(&fx.history)?, before);
    assert!(!fx.pending.exists());
    Ok(())
}

#[test]
fn second_run_without_new_dumps_changes_nothing() -> Result<()> {
    let fx = Fixture::new("twice")?;
    fx.dump(
        "plwiki",
        "20240115",
        &[("pages", "done")],
        &["plwiki-20240115-pages-articles.xml.bz2", "plwiki-20240115-pagelinks.sql.gz"],
    )?;
    fx.write_history(&[
        "project=plwiki; date=20240101; dumptypes=pages; script=./job.sh",
        "project=plwiki; date=20240101; dumptypes=links",
    ])?;
    let cfg = fx.cfg();
    let watcher = fx.watcher(&cfg)?;

    let first = watcher.run_batch(&fx.store())?;
    assert_eq!(first.entries_updated, 2);
    // вторая запись без script: курсор сдвигается, задания нет
    assert_eq!(first.jobs_queued, 1);

    let history1 = fs::read(&fx.history)?;
    let pending1 = fs::read(&fx.pending)?;
    assert_eq!(
        String::from_utf8(history1.clone())?,
        "project=plwiki; date=20240115; dumptypes=pages; script=./job.sh\n\
         project=plwiki; date=20240115; dumptypes=links\n"
    );

    let second = watcher.run_batch(&fx.store())?;
    assert!(!second.any_updated());
    assert!(!second.history_written);
    assert_eq!(fs::read(&fx.history)?, history1);
    assert_eq!(fs::read(&fx.pending)?, pending1);
    Ok(())
}

#[test]
fn broken_candidates_fall_through_to_older_dump() -> Result<()> {
    let fx = Fixture::new("broken")?;
    // 20240129: битый dumpruninfo
    let p = fx.dump("plwiki", "20240129", &[("pages", "done")], &["plwiki-20240129-pages-articles.xml.bz2"])?;
    fs::write(p.join("dumpruninfo.txt"), "garbage\n")?;
    // 20240122: нет sha1sums
    let p = fx.dump("plwiki", "20240122", &[("pages", "done")], &["plwiki-20240122-pages-articles.xml.bz2"])?;
    fs::remove_file(p.join("plwiki-20240122-sha1sums.txt"))?;
    // 20240115: контрольная сумма не совпадает
    let p = fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fs::write(p.join("plwiki-20240115-pages-articles.xml.bz2"), "truncated")?;
    // 20240108: хороший
    fx.dump("plwiki", "20240108", &[("pages", "done")], &["plwiki-20240108-pages-articles.xml.bz2"])?;

    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages; script=./job.sh"])?;
    let cfg = fx.cfg().with_verify_workers(4);
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;

    assert_eq!(report.candidates_seen, 4);
    assert_eq!(report.candidates_unloadable, 2);
    assert_eq!(report.candidates_bad_checksum, 1);
    assert_eq!(fx.store().load()?[0].date, d("20240108"));
    Ok(())
}

#[test]
fn multi_part_and_fallback_types_resolve_in_order() -> Result<()> {
    let fx = Fixture::new("multi")?;
    let dir = fx.dump(
        "eswiki",
        "20240201",
        &[("pages", "done"), ("meta", "done"), ("history", "done")],
        &[
            "eswiki-20240201-pages-articles.xml.bz2",
            "eswiki-20240201-pages-meta-all.xml.bz2",
            "eswiki-20240201-pages-history0.xml.7z",
            "eswiki-20240201-pages-history1.xml.7z",
            "eswiki-20240201-pages-history2.xml.7z",
        ],
    )?;
    fx.write_history(&["project=eswiki; date=20240101; dumptypes=history,meta,links; script=./multi.sh -v"])?;

    let cfg = fx.cfg().with_verify_workers(3);
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;
    assert_eq!(report.entries_updated, 0);

    // links → statusfallback pages, files of pagelinks are missing → checksum fails
    assert_eq!(report.candidates_bad_checksum, 1);
    assert!(!fx.pending.exists());

    // без links всё сходится
    fx.write_history(&["project=eswiki; date=20240101; dumptypes=history,meta; script=./multi.sh -v"])?;
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;
    assert_eq!(report.entries_updated, 1);
    let expected: Vec<String> = [
        "eswiki-20240201-pages-history0.xml.7z",
        "eswiki-20240201-pages-history1.xml.7z",
        "eswiki-20240201-pages-history2.xml.7z",
        "eswiki-20240201-pages-meta-all.xml.bz2",
    ]
    .iter()
    .map(|f| dir.join(f).display().to_string())
    .collect();
    assert_eq!(
        fs::read_to_string(&fx.pending)?,
        format!("./multi.sh -v {}\n", expected.join(" "))
    );
    Ok(())
}

#[test]
fn multi_type_without_any_part_is_not_ready() -> Result<()> {
    let fx = Fixture::new("noparts")?;
    fx.dump("plwiki", "20240115", &[("history", "done")], &[])?;
    fx.write_history(&["project=plwiki; date=20240101; dumptypes=history; script=./job.sh"])?;

    let cfg = fx.cfg();
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;
    assert_eq!(report.candidates_incomplete, 1);
    assert!(!report.any_updated());
    assert!(!fx.pending.exists());
    Ok(())
}

#[test]
fn missing_project_directory_aborts_without_writes() -> Result<()> {
    let fx = Fixture::new("missing")?;
    fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fx.write_history(&[
        "project=plwiki; date=20240101; dumptypes=pages; script=./job.sh",
        "project=nosuchwiki; date=20240101; dumptypes=pages; script=./job.sh",
    ])?;
    let before = fs::read(&fx.history)?;

    let cfg = fx.cfg();
    let err = fx.watcher(&cfg)?.run_batch(&fx.store()).unwrap_err();
    assert!(format!("{err:#}").contains("nosuchwiki"), "unexpected error: {err:#}");

    // первая запись обновилась бы, но прогон прерван целиком
    assert_eq!(fs::read(&fx.history)?, before);
    assert!(!fx.pending.exists());
    Ok(())
}

#[test]
fn unknown_dump_type_is_fatal() -> Result<()> {
    let fx = Fixture::new("unknown")?;
    fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages,bogus; script=./job.sh"])?;

    let cfg = fx.cfg();
    let err = fx.watcher(&cfg)?.run_batch(&fx.store()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<RegistryError>(),
        Some(&RegistryError::UnknownDumpType("bogus".into()))
    );
    assert!(!fx.pending.exists());
    Ok(())
}

#[test]
fn status_fallback_cycle_is_fatal() -> Result<()> {
    let fx = Fixture::new("cycle")?;
    fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fx.write_history(&[
        "project=plwiki; date=20240101; dumptypes=pages; script=./job.sh",
        "project=plwiki; date=20240101; dumptypes=loopa; script=./job.sh",
    ])?;
    let before = fs::read(&fx.history)?;

    let cfg = fx.cfg();
    let err = fx.watcher(&cfg)?.run_batch(&fx.store()).unwrap_err();
    match err.downcast_ref::<RegistryError>() {
        Some(RegistryError::FallbackCycle { kind, chain }) => {
            assert_eq!(*kind, "status");
            assert_eq!(chain, "loopa -> loopb -> loopa");
        }
        other => panic!("expected status cycle, got {:?}", other),
    }
    // первая запись обновилась бы, но ничего не записано
    assert_eq!(fs::read(&fx.history)?, before);
    assert!(!fx.pending.exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlinked_project_root_keeps_project_name() -> Result<()> {
    let fx = Fixture::new("symlink")?;
    // каталог проекта смонтирован под другим именем
    let volume = fx.root.join("mnt").join("plwiki-volume");
    let stamp = volume.join("20240115");
    fs::create_dir_all(&stamp)?;
    fs::write(
        stamp.join("dumpruninfo.txt"),
        "name:pages; status:done; updated:2024-01-15 08:00:00\n",
    )?;
    let file = stamp.join("plwiki-20240115-pages-articles.xml.bz2");
    fs::write(&file, "<mediawiki>plwiki</mediawiki>")?;
    fs::write(
        stamp.join("plwiki-20240115-sha1sums.txt"),
        format!("{}  plwiki-20240115-pages-articles.xml.bz2\n", sha1_file_hex(&file)?),
    )?;
    std::os::unix::fs::symlink(&volume, fx.dumps.join("plwiki"))?;

    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages; script=./job.sh"])?;
    let cfg = fx.cfg();
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;

    assert_eq!(report.candidates_unloadable, 0);
    assert_eq!(report.entries_updated, 1);
    let pending = fs::read_to_string(&fx.pending)?;
    assert_eq!(
        pending,
        format!("./job.sh {}\n", fs::canonicalize(&file)?.display())
    );
    Ok(())
}

#[test]
fn queue_is_appended_not_truncated() -> Result<()> {
    let fx = Fixture::new("append")?;
    fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages; script=./job.sh"])?;
    fs::write(&fx.pending, "./older-job.sh /some/file\n")?;

    let cfg = fx.cfg();
    fx.watcher(&cfg)?.run_batch(&fx.store())?;
    let pending = fs::read_to_string(&fx.pending)?;
    let lines: Vec<&str> = pending.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "./older-job.sh /some/file");
    assert!(lines[1].starts_with("./job.sh "));
    Ok(())
}

#[test]
fn dry_run_reports_but_writes_nothing() -> Result<()> {
    let fx = Fixture::new("dry")?;
    fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages; script=./job.sh"])?;
    let before = fs::read(&fx.history)?;

    let cfg = fx.cfg().with_dry_run(true);
    let report = fx.watcher(&cfg)?.run_batch(&fx.store())?;
    assert!(report.dry_run);
    assert_eq!(report.entries_updated, 1);
    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.jobs_queued, 0);
    assert!(!report.history_written);

    assert_eq!(fs::read(&fx.history)?, before);
    assert!(!fx.pending.exists());
    assert!(!fx.root.join(".dumpsrc.lock").exists());
    Ok(())
}

#[test]
fn ad_hoc_entry_queues_job_but_keeps_history() -> Result<()> {
    let fx = Fixture::new("adhoc")?;
    fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages; script=./job.sh"])?;
    let before = fs::read(&fx.history)?;

    let entry: TrackedEntry = "project=plwiki; date=20240110; dumptypes=pages; script=./adhoc.sh".parse()?;
    let cfg = fx.cfg();
    let (entry, report) = fx.watcher(&cfg)?.run_single(&fx.store(), entry)?;

    assert!(entry.updated);
    assert_eq!(entry.date, d("20240115"));
    assert!(!report.history_written);
    assert_eq!(fs::read(&fx.history)?, before);
    assert!(fs::read_to_string(&fx.pending)?.starts_with("./adhoc.sh "));
    Ok(())
}

#[test]
fn held_run_lock_fails_fast() -> Result<()> {
    let fx = Fixture::new("lock")?;
    fx.write_history(&["project=plwiki; date=20240101; dumptypes=pages"])?;
    fs::create_dir_all(fx.dumps.join("plwiki"))?;

    let held = dumpwatch::lock::try_acquire_run_lock(&fx.history)?;
    assert_eq!(held.path(), fx.root.join(".dumpsrc.lock").as_path());
    let cfg = fx.cfg();
    assert!(fx.watcher(&cfg)?.run_batch(&fx.store()).is_err());
    Ok(())
}

#[test]
fn directory_cache_loads_each_path_once() -> Result<()> {
    let fx = Fixture::new("cache")?;
    let newest = fx.dump("plwiki", "20240115", &[("pages", "done")], &["plwiki-20240115-pages-articles.xml.bz2"])?;
    let older = fx.dump("plwiki", "20240108", &[("pages", "done")], &["plwiki-20240108-pages-articles.xml.bz2"])?;

    let cfg = fx.cfg().with_dry_run(true);
    let watcher = fx.watcher(&cfg)?;
    let mut cache = DirCache::new();
    let mut report = RunReport::default();
    let mut entries = vec![
        TrackedEntry::new("plwiki", d("20240101"), vec!["pages".into()]),
        TrackedEntry::new("plwiki", d("20240105"), vec!["pages".into()]),
        TrackedEntry::new("plwiki", d("20240110"), vec!["pages".into()]),
    ];
    watcher.process_entries(&mut entries, &mut cache, &mut report)?;

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&newest));
    assert!(cache.contains(&older));
    assert!(entries.iter().all(|e| e.updated && e.date == d("20240115")));
    assert_eq!(entries[0].files, entries[2].files);
    assert_eq!(report.entries_updated, 3);
    Ok(())
}
