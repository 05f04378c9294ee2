pub mod candidates;
pub mod error;
pub mod events;
pub mod manifest;
pub mod prompt;
pub mod slug;
