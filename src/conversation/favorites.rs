//! Favorite toggle buttons on profile cards.

use crate::conversation::payload::FavoriteAction;
use crate::error::DatabaseError;
use crate::render::{self, Outgoing};
use crate::store::{ChatId, ProfileStore, UserId};

/// Notice shown when the bookmarked profile has been deleted meanwhile.
pub const TARGET_GONE: &str = "Profile not found";

/// Apply `action` for (`actor`, `target`) and describe the updated card.
///
/// The card's button is swapped for the opposite action. Conversation state
/// is never touched, so toggles work from any wizard step.
pub async fn toggle(
    store: &dyn ProfileStore,
    actor: UserId,
    chat_id: ChatId,
    target: UserId,
    action: FavoriteAction,
) -> Result<Vec<Outgoing>, DatabaseError> {
    match action {
        FavoriteAction::Add => {
            if !store.add_favorite(actor, target).await? {
                tracing::debug!(actor, target, "Favorite target missing");
                return Ok(vec![Outgoing::Notice(TARGET_GONE.to_string())]);
            }
        }
        FavoriteAction::Remove => store.remove_favorite(actor, target).await?,
    }

    tracing::debug!(actor, target, action = ?action, "Favorite toggled");
    let (buttons, notice) = render::favorite_toggled(target, action);
    Ok(vec![
        Outgoing::ReplaceButtons { chat_id, buttons },
        Outgoing::Notice(notice),
    ])
}
