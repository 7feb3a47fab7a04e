//! Conversation engine: per-user wizard state machine over the profile store.

pub mod engine;
pub mod favorites;
pub mod input;
pub mod payload;
pub mod prompts;
pub mod session;
pub mod state;

pub use engine::ConversationEngine;
pub use input::{Input, MenuItem};
pub use payload::{FavoriteAction, Payload};
pub use session::SessionStore;
pub use state::{ConversationState, ProfileDraft, ProfileStep, SearchDraft, SearchStep};
