pub mod atom;
pub mod config;
pub mod curator;
pub mod engine;
pub mod fetcher;
pub mod identity;
pub mod merge;
pub mod opml;
pub mod sources;
pub mod state;
pub mod types;

pub use atom::{AtomSerializer, FeedMetadata};
pub use config::{ChannelConfig, FetchSettings, JournalistConfig, PileFilter, SourceConfig};
pub use curator::Curator;
pub use engine::{reconcile, GenerationEngine};
pub use fetcher::Fetcher;
pub use merge::{merge_files, merge_items, parse_atom_document, MergeOutput};
pub use opml::{ChannelOutline, OpmlSerializer};
pub use sources::SourceAdapter;
pub use state::{ChannelState, FileStateStore, StateEntry};
pub use types::*;
