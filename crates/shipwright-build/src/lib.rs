//! Resource definition patching and source revision resolution.
//!
//! # Patching
//!
//! ```text
//! deploy/<environment>/definition.json
//!   1. Load       ── exact text + parsed document
//!   2. Locate     ── containerDefinitions[*].name == container_name (exactly one)
//!   3. Splice     ── only the `image` value's bytes are replaced
//!   4. Validate   ── family, containerDefinitions[*].{name,image}
//! ```
//!
//! Every other byte of the template, including sibling order, whitespace,
//! and number formatting, is carried through unchanged.

pub mod definition;
pub mod revision;

pub use definition::{DefinitionError, ResourceDefinition, patch};
pub use revision::{RevisionError, head_revision, is_dirty};
