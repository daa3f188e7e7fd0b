//! ecalc Resolver
//!
//! Resolves `[field:..]`, `[calc:..]` and `[lookup:..]` shortcodes in a
//! template against submitted field values and a [`Catalog`], then
//! evaluates what remains. Also provides the static [`FormulaValidator`]
//! used by the formula editor before save.
//!
//! Resolution is a pure function of the template, the field values and the
//! catalog; it does no I/O and shares no mutable state between calls.
//!
//! # Example
//!
//! ```rust
//! use ecalc_model::{CatalogSnapshot, FieldValues, Formula, MemoryCatalog, Value};
//! use ecalc_resolver::Resolver;
//!
//! let snapshot = CatalogSnapshot::new()
//!     .with_formula(Formula::new("savings", "([field:before] - [field:after]) * [field:price]"));
//! let catalog = MemoryCatalog::from_snapshot(snapshot).unwrap();
//!
//! let fields = FieldValues::new()
//!     .with("before", 20000)
//!     .with("after", 8000)
//!     .with("price", 0.5);
//! let value = Resolver::new(&catalog).resolve("[calc:savings]", &fields).unwrap();
//! assert_eq!(value, Value::Number(6000.0));
//! ```
//!
//! [`Catalog`]: ecalc_model::Catalog

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod resolver;
pub mod template;
pub mod validator;

// Re-exports
pub use config::{MissingFieldPolicy, ResolverConfig};
pub use error::ResolveError;
pub use resolver::{Resolver, Result};
pub use template::{classify, TemplateKind};
pub use validator::{FormulaValidator, IssueCode, ValidationIssue, ValidationReport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for resolution
    pub use crate::{
        FormulaValidator, MissingFieldPolicy, ResolveError, Resolver, ResolverConfig,
        ValidationReport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
