use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::transform::{TransformOptions, TransformOutput};

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub output: TransformOutput,
}

/// On-disk cache of transform results, one JSON file per source file,
/// invalidated by a hash over the source text and the options.
pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new() -> Self {
        Self::at(".hibernate/cache")
    }

    pub fn at(dir: impl AsRef<Path>) -> Self {
        let cache_dir = dir.as_ref().to_path_buf();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn compute_hash(source: &str, options: &TransformOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(options).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }

    fn get_cache_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path
            .replace("/", "_")
            .replace("\\", "_")
            .replace(":", "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(
        &self,
        file_path: &str,
        source: &str,
        options: &TransformOptions,
    ) -> Option<TransformOutput> {
        let cache_path = self.get_cache_path(file_path);
        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(file = file_path, error = %e, "discarding corrupt cache entry");
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == Self::compute_hash(source, options) {
            debug!(file = file_path, "cache hit");
            Some(entry.output)
        } else {
            None
        }
    }

    pub fn set(
        &self,
        file_path: &str,
        source: &str,
        options: &TransformOptions,
        output: &TransformOutput,
    ) {
        let cache_path = self.get_cache_path(file_path);
        let entry = CacheEntry {
            hash: Self::compute_hash(source, options),
            output: output.clone(),
        };

        if let Ok(data) = serde_json::to_string(&entry) {
            if let Err(e) = fs::write(&cache_path, data) {
                warn!(file = file_path, error = %e, "failed to write cache entry");
            }
        }
    }
}

impl Default for IncrementalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: &str) -> TransformOutput {
        TransformOutput {
            code: code.to_string(),
            map: None,
            closures: vec![],
        }
    }

    #[test]
    fn test_hit_requires_same_source_and_options() {
        let dir = std::env::temp_dir().join(format!("hibernate-cache-{}", std::process::id()));
        let cache = IncrementalCache::at(&dir);
        let options = TransformOptions::default();
        cache.set("src/app.js", "let a = 1;", &options, &output("out"));

        assert_eq!(
            cache.get("src/app.js", "let a = 1;", &options),
            Some(output("out"))
        );
        assert_eq!(cache.get("src/app.js", "let a = 2;", &options), None);

        let other = TransformOptions {
            preamble: false,
            ..TransformOptions::default()
        };
        assert_eq!(cache.get("src/app.js", "let a = 1;", &other), None);
        fs::remove_dir_all(dir).ok();
    }
}
