//! Index state persistence: the `Reader`/`Writer`
//! contract `semindex-core`'s indexer depends on, plus two concrete
//! backends.

pub mod name;
pub mod paths;
pub mod traits;

#[cfg(feature = "fs")]
pub mod local;

#[cfg(feature = "s3")]
pub mod object_store;

pub use name::sanitize_name;
pub use traits::{AsIndexStateStore, Reader, Writer};

#[cfg(feature = "fs")]
pub use local::LocalDirStore;

#[cfg(feature = "s3")]
pub use object_store::{ObjectStore, ObjectStoreConfig};
