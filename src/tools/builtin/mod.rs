pub mod recent_messages;

pub use recent_messages::RecentMessagesTool;
