pub mod common;
pub mod entry;
pub mod filter;
pub mod list;
pub mod metadata;
pub mod setting;
pub mod sort;
pub mod watch;

pub use common::*;
pub use entry::*;
pub use filter::*;
pub use list::*;
pub use metadata::*;
pub use setting::*;
pub use sort::*;
pub use watch::*;
