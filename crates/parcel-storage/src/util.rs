use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write a complete, fsynced temporary sibling of `dest` and return its path.
///
/// The temporary file name starts with `.` so directory scans can skip it.
pub(crate) fn write_tmp_sibling(
    dest: &Path,
    write: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> io::Result<PathBuf> {
    let parent = parent_dir(dest)?;
    fs::create_dir_all(parent)?;

    let (tmp_path, mut file) = open_unique_tmp_file(dest, parent)?;
    let write_result = (|| -> io::Result<()> {
        write(&mut file)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    })();
    drop(file);

    match write_result {
        Ok(()) => Ok(tmp_path),
        Err(err) => {
            remove_file_best_effort(&tmp_path, "write_tmp_sibling.write_failed");
            Err(err)
        }
    }
}

/// Atomically replace `dest` with `tmp_path`.
pub(crate) fn publish_replace(tmp_path: &Path, dest: &Path) -> io::Result<()> {
    const MAX_RENAME_ATTEMPTS: usize = 1024;

    let mut attempts = 0usize;
    let result = loop {
        match fs::rename(tmp_path, dest) {
            Ok(()) => break Ok(()),
            Err(err)
                if cfg!(windows)
                    && (err.kind() == io::ErrorKind::AlreadyExists || dest.exists()) =>
            {
                // `rename` does not overwrite on Windows; remove and retry until we win.
                match fs::remove_file(dest) {
                    Ok(()) => {}
                    Err(remove_err) if remove_err.kind() == io::ErrorKind::NotFound => {}
                    Err(remove_err) => break Err(remove_err),
                }
                attempts += 1;
                if attempts >= MAX_RENAME_ATTEMPTS {
                    break Err(err);
                }
            }
            Err(err) => break Err(err),
        }
    };

    match result {
        Ok(()) => {
            sync_dir_best_effort(parent_dir(dest)?, "publish_replace.sync_parent_dir");
            Ok(())
        }
        Err(err) => {
            remove_file_best_effort(tmp_path, "publish_replace.rename_failed");
            Err(err)
        }
    }
}

/// Publish `tmp_path` as `dest` only if `dest` does not exist yet.
///
/// Uses a hard link, which fails atomically when the destination exists.
/// Returns `false` when another writer already owns `dest`. The temporary file
/// is removed in every case.
pub(crate) fn publish_if_absent(tmp_path: &Path, dest: &Path) -> io::Result<bool> {
    let result = match fs::hard_link(tmp_path, dest) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    };
    remove_file_best_effort(tmp_path, "publish_if_absent.cleanup");
    if let Ok(true) = result {
        sync_dir_best_effort(parent_dir(dest)?, "publish_if_absent.sync_parent_dir");
    }
    result
}

pub(crate) fn remove_file_best_effort(path: &Path, reason: &'static str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::debug!(
                target: "parcel.storage",
                path = %path.display(),
                reason,
                error = %err,
                "failed to remove file"
            );
            false
        }
    }
}

fn parent_dir(path: &Path) -> io::Result<&Path> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("path has no parent"))?;
    Ok(if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    })
}

fn sync_dir_best_effort(dir: &Path, reason: &'static str) {
    #[cfg(unix)]
    {
        static SYNC_DIR_ERROR_LOGGED: std::sync::OnceLock<()> = std::sync::OnceLock::new();

        match fs::File::open(dir).and_then(|dir| dir.sync_all()) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                if SYNC_DIR_ERROR_LOGGED.set(()).is_ok() {
                    tracing::debug!(
                        target: "parcel.storage",
                        dir = %dir.display(),
                        reason,
                        error = %err,
                        "failed to sync directory (best effort)"
                    );
                }
            }
        }
    }

    #[cfg(not(unix))]
    let _ = (dir, reason);
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?
        .to_string_lossy();
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = parent.join(format!(".{file_name}.tmp.{pid}.{counter}"));

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
