use std::env;

/// Runtime configuration for the optimizer service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum single-image upload size in bytes (default: 30 MB)
    pub max_image_size: usize,

    /// Maximum per-file size for archive requests in bytes (default: 100 MB)
    pub max_archive_size: usize,

    /// Maximum number of files in one batch request (default: 10)
    pub max_batch_files: usize,

    /// Entries retained by the in-memory ledger (default: 10 000)
    pub ledger_capacity: usize,

    /// Number of recent ledger entries aggregated by /api/stats (default: 100)
    pub stats_window: usize,

    /// Append a README.txt entry to downloaded archives (default: true)
    pub archive_readme: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_image_size: 30 * 1024 * 1024,    // 30 MB
            max_archive_size: 100 * 1024 * 1024, // 100 MB
            max_batch_files: 10,
            ledger_capacity: 10_000,
            stats_window: 100,
            archive_readme: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_image_size: env::var("MAX_IMAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_image_size),

            max_archive_size: env::var("MAX_ARCHIVE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_archive_size),

            max_batch_files: env::var("MAX_BATCH_FILES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_batch_files),

            ledger_capacity: env::var("LEDGER_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.ledger_capacity),

            stats_window: env::var("STATS_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.stats_window),

            archive_readme: env::var("ARCHIVE_README")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.archive_readme),
        }
    }

    /// Create config for development and tests (small ledger, same limits)
    pub fn development() -> Self {
        Self {
            ledger_capacity: 100,
            ..Self::default()
        }
    }
}
