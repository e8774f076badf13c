//! Business logic built on top of the sources and the cache

pub mod announcement_finder;
pub mod mock;
pub mod resolver;

pub use announcement_finder::{AnnouncementFinder, FinderOutcome};
pub use resolver::{DirectPoll, Resolver};
