//! The mesh-key resolver: an O(1) key -> dense-index mapping over the
//! store's fixed universe of mesh identifiers, realized as a minimal
//! perfect hash embedded in the store file.

mod chd;
mod error;
mod resolver;

pub use chd::Chd;
pub use error::{ResolverError, ResolverResult};
pub use resolver::{LocalResolver, MeshResolver, EXCEPTIONAL_KEY, KEY_MAX_EXCLUSIVE, KEY_MIN};
