//! Source resolution
//!
//! Turns ingress paths into [`IngestSource`] values. Each source knows its
//! origin URI, table name and nature, and generates the structural, content
//! and export SQL the step engine batches per step.

pub mod reference;
pub mod resolve;
pub mod shape;
pub mod source;

pub use reference::{business_rules_placeholder_ddl, ReferenceTable, BUSINESS_RULES_COLUMNS};
pub use resolve::{csv_shape, resolve_path, IngestSourcesSupplier, WalkFsSources, WatchFsSources};
pub use shape::ContentShape;
pub use source::{source_table_name, IngestContext, IngestSource, SheetKind, SourceNature};
