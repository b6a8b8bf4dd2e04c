//! Translation sources: flattening, store building and snapshot publication

pub mod flatten;
pub mod snapshot;
pub mod store;

pub use flatten::{flatten, flatten_entries, KeyPath, PathSegment, TranslationEntry};
pub use snapshot::{RebuildTicket, StoreHandle};
pub use store::{
    is_json_file, BuildError, BuildReport, SourceError, StoreBuilder, TranslationStore,
    DEFAULT_STALE_THRESHOLD_MS,
};
