//! Streaming SHA-1 over dump files.
//!
//! Dumps can be tens of GiB, so files are never read whole: a fixed buffer is
//! fed into the hasher until EOF.

use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;

use crate::util::to_hex;

/// Read buffer for hashing.
pub const HASH_BUF_SIZE: usize = 64 * 1024;

/// Lowercase, zero-padded hex SHA-1 of a file.
pub fn sha1_file_hex(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = match f.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

/// Run `check` over every path, spreading them across up to `workers` scoped
/// threads. Returns true iff every check passed.
///
/// `check` only gets shared access, so whatever it reads (the checksum map)
/// must already be populated.
pub(crate) fn check_all<F>(paths: &[PathBuf], workers: usize, check: F) -> bool
where
    F: Fn(&Path) -> bool + Sync,
{
    if workers <= 1 || paths.len() <= 1 {
        return paths.iter().all(|p| check(p.as_path()));
    }

    let workers = workers.min(paths.len());
    let per_worker = (paths.len() + workers - 1) / workers;
    let check = &check;

    thread::scope(|s| {
        let handles: Vec<_> = paths
            .chunks(per_worker)
            .map(|part| s.spawn(move || part.iter().all(|p| check(p.as_path()))))
            .collect();
        // join все, чтобы паника в одном потоке не осталась незамеченной
        let results: Vec<bool> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .collect();
        results.into_iter().all(|ok| ok)
    })
}
