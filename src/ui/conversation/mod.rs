//! Conversation UI components for the chat screen

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;
pub mod status;

pub use composer::ConversationComposer;
pub use history::ConversationHistory;
pub use manager::{ConversationAction, ConversationManager};
