//! Bible versification engine: schemes that number every verse of a
//! tradition, dense ordinal indexing, rule-based mappings between
//! schemes, and a registry with transitive mapping derivation. Ships
//! with a small CLI over a line-oriented database format.

pub mod books;
pub mod cli;
pub mod detector;
pub mod error;
pub mod logger;
pub mod mapping;
pub mod reference;
pub mod registry;
pub mod report;
pub mod schema;
pub mod tool;
pub mod verify;
pub mod verse_set;
pub mod versification;

pub use books::BookId;
pub use error::{Result, VersificationError};
pub use mapping::VersificationMapping;
pub use reference::Reference;
pub use registry::{MappingCell, MappingSelector, VersificationRegistry};
pub use verse_set::VerseSet;
pub use versification::Versification;
