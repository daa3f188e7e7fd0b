//! ecalc Runtime
//!
//! Everything around a resolver call that is not resolution itself:
//!
//! - **Configuration**: [`EngineConfig`] loaded from TOML
//! - **Execution guards**: [`FormulaExecutor`] applies a per-caller rate
//!   limit and a per-call deadline and reports an [`ExecutionOutcome`]
//! - **Catalog loading**: [`CatalogRepository`] implementations for files,
//!   with a TTL cache in front
//! - **Telemetry**: [`telemetry::init`] installs the tracing subscriber
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ecalc_model::FieldValues;
//! use ecalc_runtime::{
//!     CatalogRepository, EngineConfig, ExecutionRequest, FileCatalogRepository, FormulaExecutor,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_file("ecalc.toml")?;
//! let catalog = FileCatalogRepository::new("catalog.json").load_catalog().await?;
//! let executor = FormulaExecutor::new(Arc::new(catalog), &config);
//!
//! let outcome = executor
//!     .run("admin", ExecutionRequest::Formula("annual_savings".into()), FieldValues::new())
//!     .await;
//! println!("{}", serde_json::to_string(&outcome)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod rate_limit;
pub mod repository;
pub mod telemetry;

// Re-exports
pub use config::{CatalogConfig, EngineConfig, ExecutionConfig, LoggingConfig};
pub use error::{ConfigError, ExecutionError, RepositoryError};
pub use executor::{ExecutionOutcome, ExecutionRequest, FormulaExecutor};
pub use rate_limit::RateLimiter;
pub use repository::{CachedRepository, CatalogRepository, FileCatalogRepository};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running formulas
    pub use crate::{
        CatalogRepository, EngineConfig, ExecutionOutcome, ExecutionRequest, FileCatalogRepository,
        FormulaExecutor,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
