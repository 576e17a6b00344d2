//! The concrete pipeline stages, in chain order.

pub mod walker;
pub mod lookup;
pub mod dirty;
pub mod extract;
pub mod filter;
pub mod acl;
pub mod persist;

pub use acl::AclStage;
pub use dirty::DirtyStage;
pub use extract::ExtractStage;
pub use filter::FilterStage;
pub use lookup::LookupStage;
pub use persist::PersistStage;
pub use walker::{spawn_walker, WalkRoot};
