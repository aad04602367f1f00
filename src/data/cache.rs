//! Download-once cache for the scoring artifact
//!
//! The cached file is only ever written whole: downloads land in a temp file
//! next to the target, are validated, then renamed into place. An exclusive
//! lock file serializes concurrent processes so only one of them downloads.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;

use crate::model::ScoringArtifact;
use crate::{ArtifactConfig, Result, TalentError};

/// Local cache of the scoring artifact with an optional remote source
pub struct ArtifactCache {
    path: PathBuf,
    url: Option<String>,
    client: reqwest::blocking::Client,
    max_attempts: u32,
}

impl ArtifactCache {
    pub fn new<P: Into<PathBuf>>(path: P, url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("cricket-talent/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TalentError::ArtifactUnavailable(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(ArtifactCache {
            path: path.into(),
            url,
            client,
            max_attempts: 3,
        })
    }

    pub fn from_config(config: &ArtifactConfig) -> Result<Self> {
        Ok(Self::new(
            &config.cache_path,
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_max_attempts(config.max_attempts))
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_cached(&self) -> bool {
        self.path.exists()
    }

    /// Make sure the artifact is in the cache, downloading it if absent
    pub fn ensure(&self) -> Result<&Path> {
        if self.is_cached() {
            log::debug!("Artifact already cached at {}", self.path.display());
            return Ok(&self.path);
        }
        self.fetch(false)
    }

    /// Download the artifact again even if a cached copy exists
    pub fn refresh(&self) -> Result<&Path> {
        self.fetch(true)
    }

    /// Ensure the artifact is cached and deserialize it
    pub fn load(&self) -> Result<ScoringArtifact> {
        let path = self.ensure()?;
        ScoringArtifact::load(path)
    }

    fn fetch(&self, force: bool) -> Result<&Path> {
        let url = self.url.as_deref().ok_or_else(|| {
            TalentError::ArtifactUnavailable(format!(
                "no artifact at {} and no artifact url configured",
                self.path.display()
            ))
        })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let lock_path = self.lock_path();
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.lock_exclusive()?;

        // Another process may have finished the download while we waited
        if !force && self.is_cached() {
            log::debug!("Artifact appeared while waiting for lock");
            release(&lock, &lock_path);
            return Ok(&self.path);
        }

        let result = self.download(url, &dir);
        release(&lock, &lock_path);
        result.map(|_| self.path.as_path())
    }

    fn download(&self, url: &str, dir: &Path) -> Result<()> {
        log::info!("Downloading scoring artifact from {}", url);
        let bytes = with_retry(|| self.fetch_bytes(url), self.max_attempts)?;

        let text = std::str::from_utf8(&bytes).map_err(|e| {
            TalentError::ArtifactUnavailable(format!("artifact is not valid UTF-8: {}", e))
        })?;
        ScoringArtifact::from_json(text)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| TalentError::Io(e.error))?;

        log::info!(
            "Cached artifact ({} bytes) at {}",
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(local) = url.strip_prefix("file://") {
            return std::fs::read(local).map_err(|e| {
                TalentError::ArtifactUnavailable(format!("failed to read {}: {}", local, e))
            });
        }

        let response = self.client.get(url).send().map_err(|e| {
            TalentError::ArtifactUnavailable(format!("request to {} failed: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(TalentError::ArtifactUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let bytes = response.bytes().map_err(|e| {
            TalentError::ArtifactUnavailable(format!("failed to read response body: {}", e))
        })?;
        Ok(bytes.to_vec())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

/// Retry an operation with exponential backoff
pub fn with_retry<T, F>(mut operation: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;
    for attempt in 0..max_attempts {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                log::warn!("Attempt {} failed: {}", attempt + 1, e);
                last_error = Some(e);
                if attempt < max_attempts - 1 {
                    let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        TalentError::ArtifactUnavailable("operation was never attempted".to_string())
    }))
}

/// Unlock explicitly; closing the handle would release it as well
fn release(lock: &std::fs::File, path: &Path) {
    if let Err(e) = FileExt::unlock(lock) {
        log::warn!("Failed to release lock {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::artifact::tests::sample_artifact;

    fn cache_in(dir: &Path, url: Option<String>) -> ArtifactCache {
        ArtifactCache::new(dir.join("cache").join("model.json"), url, Duration::from_secs(5))
            .unwrap()
            .with_max_attempts(1)
    }

    fn source_file(dir: &Path) -> String {
        let source = dir.join("source.json");
        sample_artifact().save(&source).unwrap();
        format!("file://{}", source.display())
    }

    #[test]
    fn test_ensure_downloads_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), Some(source_file(dir.path())));

        assert!(!cache.is_cached());
        let path = cache.ensure().unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(cache.load().unwrap(), sample_artifact());
    }

    #[test]
    fn test_present_file_is_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let url = source_file(dir.path());
        let cache = cache_in(dir.path(), Some(url));
        cache.ensure().unwrap();

        // Source disappears; the cached copy must still be used
        std::fs::remove_file(dir.path().join("source.json")).unwrap();
        assert!(cache.ensure().is_ok());
        assert!(cache.load().is_ok());
    }

    #[test]
    fn test_refresh_replaces_cached_copy() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), Some(source_file(dir.path())));
        cache.ensure().unwrap();

        let mut updated = sample_artifact();
        updated.countries.retain(|c| c == "India");
        updated.save(dir.path().join("source.json")).unwrap();

        cache.refresh().unwrap();
        assert_eq!(cache.load().unwrap().countries, vec!["India".to_string()]);
    }

    #[test]
    fn test_missing_url_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), None);

        let err = cache.ensure().unwrap_err();
        assert!(matches!(err, TalentError::ArtifactUnavailable(_)));
    }

    #[test]
    fn test_invalid_download_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.json");
        std::fs::write(&source, "{\"pipeline\": 1}").unwrap();
        let cache = cache_in(dir.path(), Some(format!("file://{}", source.display())));

        assert!(matches!(
            cache.ensure(),
            Err(TalentError::ArtifactUnavailable(_))
        ));
        assert!(!cache.is_cached());
    }

    #[test]
    fn test_with_retry_eventually_succeeds() {
        let mut calls = 0;
        let result = with_retry(
            || {
                calls += 1;
                if calls < 2 {
                    Err(TalentError::ArtifactUnavailable("flaky".to_string()))
                } else {
                    Ok(calls)
                }
            },
            3,
        );
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_with_retry_returns_last_error() {
        let result: Result<()> = with_retry(
            || Err(TalentError::InvalidInput("nope".to_string())),
            2,
        );
        assert!(matches!(result, Err(TalentError::InvalidInput(_))));
    }

    #[test]
    fn test_waiter_uses_artifact_written_while_it_held_off() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), Some(source_file(dir.path())));
        let path = cache.path().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        // Stand in for another process that is mid-download
        let holder = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(cache.lock_path())
            .unwrap();
        holder.lock_exclusive().unwrap();

        let waiter = std::thread::spawn(move || cache.ensure().map(|p| p.to_path_buf()));
        std::thread::sleep(Duration::from_millis(200));

        let mut theirs = sample_artifact();
        theirs.countries.retain(|c| c == "India");
        theirs.save(&path).unwrap();
        // A second download would now fail
        std::fs::remove_file(dir.path().join("source.json")).unwrap();
        FileExt::unlock(&holder).unwrap();

        let ready = waiter.join().unwrap().unwrap();
        assert_eq!(ready, path);
        assert_eq!(
            ScoringArtifact::load(&path).unwrap().countries,
            vec!["India".to_string()]
        );
    }

    #[test]
    fn test_concurrent_ensure_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let url = source_file(dir.path());
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cache = cache_in(dir.path(), Some(url.clone()));
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.ensure().map(|p| p.to_path_buf())
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        let cache = cache_in(dir.path(), Some(url));
        assert_eq!(cache.load().unwrap(), sample_artifact());
    }

    #[test]
    fn test_lock_path_sits_next_to_artifact() {
        let cache = ArtifactCache::new("/tmp/x/model.json", None, Duration::from_secs(1)).unwrap();
        assert_eq!(cache.lock_path(), PathBuf::from("/tmp/x/model.json.lock"));
    }
}
