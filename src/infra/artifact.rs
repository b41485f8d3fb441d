//! On-disk stylesheet cache file.

use std::{
    fs::{self, File, Metadata, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

/// File name of the generated artifact inside the stylesheet directory.
pub const CACHE_FILE_NAME: &str = "style.cache";

/// Seconds since the Unix epoch of the entry's last modification.
pub(crate) fn modified_secs(metadata: &Metadata) -> io::Result<u64> {
    let modified = metadata.modified()?;
    modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|err| io::Error::other(format!("modification time precedes epoch: {err}")))
}

#[derive(Debug, Clone)]
pub struct CacheArtifact {
    path: PathBuf,
}

impl CacheArtifact {
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            path: directory.join(CACHE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Modification time of the artifact, or 0 when it is absent or unreadable.
    pub fn modified_secs(&self) -> u64 {
        match fs::metadata(&self.path) {
            Ok(metadata) if metadata.is_file() => modified_secs(&metadata).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Replace the artifact contents while holding an exclusive lock on the file.
    ///
    /// The file is truncated only after the lock is acquired so concurrent
    /// writers never interleave.
    pub fn write_locked(&self, css: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock()?;
        let written = replace_contents(&mut file, css);
        let unlocked = file.unlock();
        written.and(unlocked)
    }

    /// Modification time as reported by the filesystem after a write.
    pub fn written_secs(&self) -> io::Result<u64> {
        let metadata = fs::metadata(&self.path)?;
        modified_secs(&metadata)
    }

    /// Delete the artifact; a missing file is not an error.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

fn replace_contents(file: &mut File, css: &[u8]) -> io::Result<()> {
    file.set_len(0)?;
    file.write_all(css)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::{Duration, SystemTime},
    };

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_artifact_reports_zero() {
        let dir = tempdir().expect("tempdir");
        let artifact = CacheArtifact::in_directory(dir.path());

        assert!(!artifact.exists());
        assert_eq!(artifact.modified_secs(), 0);
    }

    #[test]
    fn directory_in_place_of_artifact_reports_zero() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(CACHE_FILE_NAME)).expect("mkdir");
        let artifact = CacheArtifact::in_directory(dir.path());

        assert_eq!(artifact.modified_secs(), 0);
    }

    #[test]
    fn write_replaces_longer_contents() {
        let dir = tempdir().expect("tempdir");
        let artifact = CacheArtifact::in_directory(dir.path());

        artifact
            .write_locked(b"a{color:red}b{color:blue}")
            .expect("first write");
        artifact.write_locked(b"a{top:0}").expect("second write");

        assert_eq!(artifact.read().expect("read"), b"a{top:0}");
        assert!(artifact.written_secs().expect("mtime") > 0);
    }

    #[test]
    fn modified_secs_follows_filesystem_clock() {
        let dir = tempdir().expect("tempdir");
        let artifact = CacheArtifact::in_directory(dir.path());
        artifact.write_locked(b"a{top:0}").expect("write");

        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(artifact.path())
            .and_then(|file| file.set_modified(stamp))
            .expect("set mtime");

        assert_eq!(artifact.modified_secs(), 1_600_000_000);
    }

    #[test]
    fn remove_tolerates_missing_file() {
        let dir = tempdir().expect("tempdir");
        let artifact = CacheArtifact::in_directory(dir.path());

        artifact.remove().expect("missing artifact is fine");
        artifact.write_locked(b"a{top:0}").expect("write");
        artifact.remove().expect("remove");
        assert!(!artifact.exists());
    }

    #[test]
    fn concurrent_writers_leave_one_whole_payload() {
        const WRITERS: usize = 8;

        let dir = tempdir().expect("tempdir");
        let artifact = CacheArtifact::in_directory(dir.path());
        let payloads: Vec<Vec<u8>> = (0..WRITERS)
            .map(|writer| {
                let marker = b'a' + writer as u8;
                // Decreasing lengths so a missing truncate would leave a tail.
                vec![marker; 64 * 1024 * (WRITERS - writer)]
            })
            .collect();

        let barrier = Arc::new(Barrier::new(WRITERS));
        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let artifact = artifact.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    artifact.write_locked(&payload).expect("locked write");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        let contents = artifact.read().expect("read");
        assert!(
            payloads.iter().any(|payload| *payload == contents),
            "artifact holds {} bytes that match no single payload",
            contents.len()
        );
    }
}
