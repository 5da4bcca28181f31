//! Translation tables for rehost.
//!
//! A [`TranslationTable`] maps class and member names from a source
//! namespace to a target namespace. Both lookup directions are derived
//! from one set of entries:
//!
//! - `forward()` renames symbols while remapping compiled units
//! - `reverse()` turns target names back into source names, which the
//!   access-rule translator needs to find field descriptors
//!
//! Tables are read from tiny v1/v2 files with [`load_tiny`].

pub mod descriptor;
pub mod error;
pub mod hierarchy;
pub mod table;
pub mod tiny;

pub use descriptor::{remap_descriptor, remap_signature};
pub use error::{MappingError, MappingResult};
pub use hierarchy::{ClassHierarchy, ClassNode};
pub use table::{ClassMapping, FieldMatch, MemberKey, MemberMapping, TableView, TranslationTable};
pub use tiny::{load_tiny, read_tiny};
