//! Data model, filter pipeline, indexer, and tool contracts shared by
//! every semindex crate. Storage backends and content-Source adapters
//! are deliberately out of scope here; this crate only defines the
//! traits they implement (`Source`, `ContextEngine`, `IndexStateStore`)
//! plus the pure logic that drives them.

pub mod config;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod indexer;
pub mod model;
pub mod source;
pub mod tools;

/// Common imports for downstream crates, mirroring the re-export
/// convenience other core crates in this style typically offer.
pub mod prelude {
    pub use crate::config::CoreConfig;
    pub use crate::engine::{
        ContextEngine, ContextEngineFactory, EngineAuth, InMemoryContextEngine, InMemoryEngineFactory,
    };
    pub use crate::errors::{IndexError, IndexResult};
    pub use crate::filter::{FilterDecision, FilterPipeline};
    pub use crate::indexer::{IndexStateStore, Indexer, NameLocks};
    pub use crate::model::{
        FileChanges, FileEntry, FileInfo, FileKind, IndexResultType, IndexState, RejectReason, SourceMetadata,
    };
    pub use crate::source::{ReadOptions, Source};
}
