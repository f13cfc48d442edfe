//! Header fields, header sections and the accessors that give them meaning
//!
//! A [`HeaderSection`] stores the fields of one message in wire order and,
//! in parallel, indexed by numeric id. Ids come from header namespaces via
//! [`HeaderAccessors`]; fields nobody recognises stay unresolved and are
//! carried through untouched.

pub mod accessor;
pub mod field;
pub mod section;

pub use accessor::{FieldAccessor, HeaderAccessor, HeaderAccessors, HeaderNamespace};
pub use field::{FieldId, HeaderField};
pub use section::{FieldHandle, HeaderSection, Iter};
