/// Content layer: video and comment access plus listing view models

pub mod feed;
pub mod format;
pub mod repository;

pub use feed::{FeedTab, Listing};
pub use format::{format_views, time_ago};
pub use repository::{ChannelStats, ContentRepository};
