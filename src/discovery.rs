//! Batch compilation.
//!
//! Recursively scans a directory for script files and transforms each of
//! them in parallel, consulting the incremental cache when one is given.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cache::IncrementalCache;
use crate::transform::{transform_with, TransformOptions, TransformOutput};
use crate::validate::{CompilerError, ERR_IO};

const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "jsx", "ts", "mts", "tsx"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CompiledFile {
    pub path: String,
    pub output: Option<TransformOutput>,
    pub error: Option<CompilerError>,
    pub cached: bool,
}

/// Recursively find all script files in a directory, in a stable order.
pub fn find_script_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.components().any(|c| c.as_os_str() == "node_modules") {
            continue;
        }
        let is_script = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| SCRIPT_EXTENSIONS.contains(&ext));
        if is_script {
            files.push(path.to_path_buf());
        }
    }

    files
}

fn compile_file(
    file_path: &Path,
    options: &TransformOptions,
    cache: Option<&IncrementalCache>,
) -> CompiledFile {
    let path_str = file_path.to_string_lossy().to_string();
    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(e) => {
            warn!(file = %path_str, error = %e, "failed to read source");
            return CompiledFile {
                path: path_str.clone(),
                output: None,
                error: Some(CompilerError::new(
                    ERR_IO,
                    &format!("Failed to read file: {}", e),
                    &path_str,
                    0,
                    0,
                )),
                cached: false,
            };
        }
    };

    let options = TransformOptions {
        filename: path_str.clone(),
        ..options.clone()
    };
    if let Some(output) = cache.and_then(|c| c.get(&path_str, &source, &options)) {
        return CompiledFile {
            path: path_str,
            output: Some(output),
            error: None,
            cached: true,
        };
    }

    let result = options
        .selection()
        .and_then(|selection| transform_with(&source, &options, &selection));
    match result {
        Ok(output) => {
            if let Some(cache) = cache {
                cache.set(&path_str, &source, &options, &output);
            }
            CompiledFile {
                path: path_str,
                output: Some(output),
                error: None,
                cached: false,
            }
        }
        Err(error) => {
            warn!(file = %path_str, code = %error.code, "transform failed");
            CompiledFile {
                path: path_str,
                output: None,
                error: Some(error),
                cached: false,
            }
        }
    }
}

/// Transforms every script under `root`. Failures are reported per file;
/// one bad file never stops the batch.
pub fn transform_tree(
    root: &Path,
    options: &TransformOptions,
    cache: Option<&IncrementalCache>,
) -> Vec<CompiledFile> {
    let files = find_script_files(root);
    let compiled: Vec<CompiledFile> = files
        .par_iter()
        .map(|path| compile_file(path, options, cache))
        .collect();
    info!(
        root = %root.display(),
        files = compiled.len(),
        cached = compiled.iter().filter(|f| f.cached).count(),
        failed = compiled.iter().filter(|f| f.error.is_some()).count(),
        "transformed source tree"
    );
    compiled
}

#[cfg(feature = "napi")]
#[napi]
pub fn transform_tree_native(
    root: String,
    options_json: Option<String>,
) -> napi::Result<Vec<CompiledFile>> {
    let options = match options_json {
        Some(json) => TransformOptions::from_json(&json),
        None => Ok(TransformOptions::default()),
    }
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let cache = IncrementalCache::new();
    Ok(transform_tree(Path::new(&root), &options, Some(&cache)))
}
