//! LSP features over the translation store
//!
//! Both features are pure functions of a document text, a cursor position
//! and a store snapshot, so the backend can answer from whatever snapshot is
//! current without waiting for rebuilds.

pub mod completion;
pub mod hover;

pub use completion::completion_items;
pub use hover::hover;
