//! Presentation adapter: pure functions from records to render descriptors.
//!
//! Nothing here touches the store or a channel. The engine decides what to
//! render; the channel decides how to deliver it. Text uses Telegram's HTML
//! parse mode, so every user-supplied value goes through [`escape_html`].

use crate::conversation::payload::{FavoriteAction, Payload};
use crate::store::{ChatId, UserId, UserProfile};

/// Placeholder shown for unset profile fields.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Labels of reply-keyboard buttons. Pressing one sends its label as text.
pub mod labels {
    pub const SEARCH: &str = "🔍 Search colleagues";
    pub const MY_PROFILE: &str = "👤 My profile";
    pub const FAVORITES: &str = "⭐ Favorites";
    pub const BACK: &str = "🔙 Back";
    pub const SKIP: &str = "Skip";
}

/// An inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: Payload,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: Payload) -> Self {
        Self {
            label: label.into(),
            payload,
        }
    }
}

/// Keyboard attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever keyboard the client currently shows.
    None,
    /// Persistent reply keyboard; each label is sent back as a text message.
    Menu(Vec<Vec<String>>),
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<Button>>),
}

/// A message to deliver to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Keyboard,
}

impl RenderRequest {
    pub fn new(chat_id: ChatId, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard,
        }
    }
}

/// One delivery instruction produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Send a new message.
    Send(RenderRequest),
    /// Replace text and buttons of the message whose button was pressed.
    Replace(RenderRequest),
    /// Replace only the buttons of the message whose button was pressed.
    ReplaceButtons {
        chat_id: ChatId,
        buttons: Vec<Vec<Button>>,
    },
    /// Short acknowledgement of a button press.
    Notice(String),
}

/// Text plus inline buttons, not yet bound to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

impl Rendered {
    pub fn into_request(self, chat_id: ChatId) -> RenderRequest {
        RenderRequest::new(chat_id, self.text, Keyboard::Inline(self.buttons))
    }
}

/// The main-menu reply keyboard.
pub fn main_menu() -> Keyboard {
    Keyboard::Menu(vec![
        vec![labels::SEARCH.to_string(), labels::MY_PROFILE.to_string()],
        vec![labels::FAVORITES.to_string()],
    ])
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn field(value: &str) -> String {
    if value.trim().is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        escape_html(value)
    }
}

fn profile_fields(profile: &UserProfile) -> String {
    format!(
        "<b>Department:</b> {}\n\
         <b>Profession:</b> {}\n\
         <b>Experience:</b> {}\n\
         <b>Portfolio:</b> {}\n\
         <b>Location:</b> {}",
        field(&profile.department),
        field(&profile.profession),
        field(&profile.experience),
        field(&profile.portfolio),
        field(&profile.location),
    )
}

/// Text of the viewer's own profile, followed by `footer`.
pub fn own_profile_text(profile: &UserProfile, footer: &str) -> String {
    format!(
        "👤 <b>Your profile</b>\n\n{}\n\n{footer}",
        profile_fields(profile)
    )
}

/// Add-or-remove button for a colleague's card.
pub fn favorite_button(target: UserId, is_favorite: bool) -> Button {
    if is_favorite {
        Button::new(
            "❌ Remove from favorites",
            Payload::Favorite {
                action: FavoriteAction::Remove,
                target,
            },
        )
    } else {
        Button::new(
            "⭐ Add to favorites",
            Payload::Favorite {
                action: FavoriteAction::Add,
                target,
            },
        )
    }
}

/// Edit / delete buttons for the owner's profile card.
pub fn owner_buttons() -> Vec<Vec<Button>> {
    vec![vec![
        Button::new("✏️ Edit", Payload::EditProfile),
        Button::new("🗑️ Delete profile", Payload::DeleteProfile),
    ]]
}

/// Render a profile for `viewer`.
///
/// The owner sees edit/delete actions; anyone else sees a favorite toggle
/// reflecting `is_favorite` and a contact link.
pub fn profile_card(profile: &UserProfile, viewer: UserId, is_favorite: bool) -> Rendered {
    if profile.user_id == viewer {
        return Rendered {
            text: own_profile_text(profile, "Use the buttons below to manage your profile."),
            buttons: owner_buttons(),
        };
    }

    Rendered {
        text: format!(
            "👤 <b>{}</b>\n\n{}\n\n<a href=\"tg://user?id={}\">Send a message</a>",
            field(&profile.handle),
            profile_fields(profile),
            profile.user_id,
        ),
        buttons: vec![vec![favorite_button(profile.user_id, is_favorite)]],
    }
}

/// Buttons and acknowledgement after a favorite toggle was applied.
///
/// The returned button offers the opposite action, so repeated presses on the
/// same card alternate without re-querying the store.
pub fn favorite_toggled(target: UserId, applied: FavoriteAction) -> (Vec<Vec<Button>>, String) {
    let now_favorite = applied.opposite() == FavoriteAction::Remove;
    let notice = match applied {
        FavoriteAction::Add => "✅ Added to favorites",
        FavoriteAction::Remove => "❌ Removed from favorites",
    };
    (
        vec![vec![favorite_button(target, now_favorite)]],
        notice.to_string(),
    )
}

/// Confirmation prompt shown before deleting a profile.
pub fn delete_confirmation() -> Rendered {
    Rendered {
        text: "⚠️ Are you sure you want to delete your profile?\n\
               This cannot be undone. All your data will be permanently removed."
            .to_string(),
        buttons: vec![vec![
            Button::new("✅ Yes, delete", Payload::ConfirmDelete),
            Button::new("❌ No, cancel", Payload::CancelDelete),
        ]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(user_id: UserId) -> UserProfile {
        UserProfile {
            user_id,
            handle: "@alice".into(),
            department: "Sound".into(),
            profession: "Sound engineers".into(),
            experience: String::new(),
            portfolio: String::new(),
            location: "Berlin".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unset_fields_render_placeholder() {
        let card = profile_card(&profile(1), 2, false);
        assert!(card.text.contains("<b>Experience:</b> Not specified"));
        assert!(card.text.contains("<b>Portfolio:</b> Not specified"));
        assert!(card.text.contains("<b>Location:</b> Berlin"));
    }

    #[test]
    fn colleague_card_offers_add_when_not_favorite() {
        let card = profile_card(&profile(1), 2, false);
        assert_eq!(
            card.buttons[0][0].payload,
            Payload::Favorite {
                action: FavoriteAction::Add,
                target: 1
            }
        );
        assert!(card.text.contains("tg://user?id=1"));
    }

    #[test]
    fn colleague_card_offers_remove_when_favorite() {
        let card = profile_card(&profile(1), 2, true);
        assert_eq!(
            card.buttons[0][0].payload,
            Payload::Favorite {
                action: FavoriteAction::Remove,
                target: 1
            }
        );
    }

    #[test]
    fn owner_card_offers_edit_and_delete() {
        let card = profile_card(&profile(1), 1, false);
        let payloads: Vec<_> = card.buttons[0].iter().map(|b| b.payload).collect();
        assert_eq!(payloads, vec![Payload::EditProfile, Payload::DeleteProfile]);
        assert!(card.text.contains("Your profile"));
    }

    #[test]
    fn user_text_is_escaped() {
        let mut p = profile(1);
        p.location = "<script>alert(1)</script>".into();
        p.handle = "Tom & Jerry".into();
        let card = profile_card(&p, 2, false);
        assert!(card.text.contains("&lt;script&gt;"));
        assert!(card.text.contains("Tom &amp; Jerry"));
        assert!(!card.text.contains("<script>"));
    }

    #[test]
    fn toggle_returns_opposite_button() {
        let (buttons, notice) = favorite_toggled(5, FavoriteAction::Add);
        assert_eq!(
            buttons[0][0].payload,
            Payload::Favorite {
                action: FavoriteAction::Remove,
                target: 5
            }
        );
        assert!(notice.contains("Added"));

        let (buttons, _) = favorite_toggled(5, FavoriteAction::Remove);
        assert_eq!(
            buttons[0][0].payload,
            Payload::Favorite {
                action: FavoriteAction::Add,
                target: 5
            }
        );
    }

    #[test]
    fn into_request_binds_chat() {
        let req = delete_confirmation().into_request(42);
        assert_eq!(req.chat_id, 42);
        assert!(matches!(req.keyboard, Keyboard::Inline(ref rows) if rows[0].len() == 2));
    }
}
