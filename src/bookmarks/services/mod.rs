pub mod bookmark_service;
pub mod feed;

pub use bookmark_service::BookmarkService;
pub use feed::{Connection, ConnectionManager, FeedService};
