pub mod archive;
pub mod health;
pub mod optimize;
pub mod stats;
pub mod types;

pub use types::*;

pub use archive::download_zip;
pub use health::health_check;
pub use optimize::{optimize_batch, optimize_image};
pub use stats::get_stats;
