pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod order;
pub mod pricing;
pub mod server;
pub mod storage;
pub mod telemetry;

pub use config::{load_config, Config};
pub use db::order_repo::OrderFilter;
pub use db::Database;
pub use dispatch::{Ack, JobDispatcher, TransitionPolicy};
pub use error::{ConfigError, PrintHubError, Result, StorageError, ValidationError};
pub use intake::{FileMetadata, OrderIntake, Submission, UploadedFile};
pub use order::{ColorMode, FileEntry, Order, OrderId, OrderStatus};
pub use pricing::{PriceQuote, PrintSpec};
pub use server::{router, serve, AppState};
pub use storage::{BlobStore, FileBlobStore, StoredBlob};
