pub mod library;
pub mod lists;
pub mod settings;
pub mod source;
pub mod sync;
pub mod tmdb;

pub use library::{LibraryEvent, LibraryService, Overlay};
pub use lists::ListService;
pub use settings::SettingsService;
pub use source::MetadataSource;
pub use sync::{EntryFailure, LibrarySynchronizer, ReloadOutcome, SyncOptions, SyncPhase};
pub use tmdb::TmdbService;
