//! ecalc Model
//!
//! Typed records for the shortcode engine: formulas, lookup tables and
//! card fields, plus the catalog that indexes them by shortcode name.
//!
//! # Overview
//!
//! - **Value**: a resolved value, either a number or a string
//! - **Formula**: a named stored expression referenced by `[calc:name]`
//! - **FormulaLookup**: an ordered condition table referenced by `[lookup:name]`
//! - **CardField**: a form input referenced by `[field:name]`
//! - **Catalog**: name-based access to all of the above
//!
//! # Example
//!
//! ```rust
//! use ecalc_model::{Catalog, CatalogSnapshot, Formula, MemoryCatalog};
//!
//! let snapshot = CatalogSnapshot::new()
//!     .with_formula(Formula::new("savings", "[field:before] - [field:after]"));
//! let catalog = MemoryCatalog::from_snapshot(snapshot).unwrap();
//!
//! assert!(catalog.formula("savings").is_some());
//! ```

#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod field;
pub mod formula;
pub mod lookup;
pub mod shortcode;
pub mod value;

// Re-exports
pub use catalog::{Catalog, CatalogSnapshot, MemoryCatalog};
pub use error::{CatalogError, ConditionParseError};
pub use field::{CardField, FieldOption, FieldType};
pub use formula::{Formula, FormulaType};
pub use lookup::{ComparisonOp, ConditionRule, FormulaLookup, LookupCondition, LookupDefault, LookupTarget};
pub use shortcode::{is_valid_name, ShortcodeKind, ShortcodeRef};
pub use value::{FieldValues, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for catalog operations
    pub use crate::{
        CardField, Catalog, CatalogSnapshot, FieldValues, Formula, FormulaLookup, LookupCondition,
        MemoryCatalog, ShortcodeKind, ShortcodeRef, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
