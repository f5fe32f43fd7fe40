//! Per-invocation file workspace
//!
//! Every analysis call owns one `Workspace`. Derived rasters go to uniquely
//! named files under the configured output directory; intermediate rasters
//! (aligned or clipped copies) go to the system temp directory and are
//! removed when the workspace drops, on success and error paths alike.
//! Unique names keep concurrent invocations from colliding on outputs.

use crate::config::EngineConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Scoped registry of output and temporary raster paths for one call
#[derive(Debug)]
pub struct Workspace {
    output_dir: PathBuf,
    temp_files: Mutex<Vec<PathBuf>>,
}

impl Workspace {
    /// Create a workspace, ensuring the output directory exists
    pub fn create(config: &EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            output_dir: config.output_dir.clone(),
            temp_files: Mutex::new(Vec::new()),
        })
    }

    /// Unique path for a persisted derivative raster (not cleaned up)
    pub fn output_raster(&self, prefix: &str) -> PathBuf {
        self.output_dir.join(unique_name(prefix, ".tif"))
    }

    /// Unique path for an intermediate raster, removed when the workspace
    /// drops
    pub fn temp_raster(&self, prefix: &str) -> PathBuf {
        let path = std::env::temp_dir().join(unique_name(prefix, ".tif"));
        if let Ok(mut temps) = self.temp_files.lock() {
            temps.push(path.clone());
        }
        path
    }

    /// Register an externally created file for cleanup
    pub fn adopt_temp(&self, path: &Path) {
        if let Ok(mut temps) = self.temp_files.lock() {
            temps.push(path.to_path_buf());
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Ok(temps) = self.temp_files.get_mut() {
            for path in temps.iter() {
                if path.exists() {
                    if let Err(e) = std::fs::remove_file(path) {
                        warn!(path = %path.display(), error = %e, "failed to remove temp raster");
                    }
                }
            }
        }
    }
}

fn unique_name(prefix: &str, ext: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let prefix = if prefix.is_empty() { "raster" } else { prefix };
    format!("{}_{}_{}_{}{}", prefix, process::id(), nanos, seq, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig {
            output_dir: std::env::temp_dir().join("landmon_ws_test"),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn unique_paths_do_not_collide() {
        let ws = Workspace::create(&test_config()).unwrap();
        let a = ws.output_raster("lulc");
        let b = ws.output_raster("lulc");
        assert_ne!(a, b);
    }

    #[test]
    fn temp_files_removed_on_drop() {
        let path;
        {
            let ws = Workspace::create(&test_config()).unwrap();
            path = ws.temp_raster("clip");
            std::fs::write(&path, b"stub").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
