// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use ifc_stream_core::TilerSettings;

/// Files strictly larger than this are flagged for the streaming path (15 MiB).
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 15 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory for tile storage.
    pub cache_dir: String,
    /// Maximum upload size in MB.
    pub max_file_size_mb: usize,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Base URL tile handles are built from.
    pub public_url: String,
    /// Allowed CORS origins (comma-separated, or "*" for all in development).
    pub cors_origins: Vec<String>,
    /// Chunking thresholds for the tiler.
    pub tiler: TilerSettings,
    /// Size above which a response is marked `large_file`.
    pub large_file_threshold: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port = env_or("PORT", 8080u16);
        let defaults = TilerSettings::default();

        Self {
            port,
            cache_dir: std::env::var("CACHE_DIR").unwrap_or_else(|_| {
                if std::path::Path::new("/.dockerenv").exists() {
                    "/app/cache".into()
                } else {
                    std::env::current_dir()
                        .ok()
                        .and_then(|dir| dir.join(".cache").to_str().map(|s| s.to_string()))
                        .unwrap_or_else(|| "./.cache".into())
                }
            }),
            max_file_size_mb: env_or("MAX_FILE_SIZE_MB", 500),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 300),
            public_url: std::env::var("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| {
                    "http://localhost:3000,http://localhost:5173,http://127.0.0.1:3000,http://127.0.0.1:5173".into()
                })
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            tiler: TilerSettings {
                min_geometry_size: env_or("IFC_STREAM_MIN_GEOMETRY_SIZE", defaults.min_geometry_size),
                min_assets_size: env_or("IFC_STREAM_MIN_ASSETS_SIZE", defaults.min_assets_size),
                ..defaults
            },
            large_file_threshold: std::env::var("IFC_STREAM_LARGE_FILE_MB")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(DEFAULT_LARGE_FILE_THRESHOLD),
        }
    }

    /// Upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
