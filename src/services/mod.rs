pub mod cache_writer;
pub mod notification;

pub use cache_writer::CacheWriter;
pub use notification::{dispatch, LogSink, Notification, NotificationSink};
