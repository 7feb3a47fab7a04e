//! Normalises raw channel events into engine inputs.

use crate::channels::{EventKind, InboundEvent};
use crate::conversation::payload::Payload;
use crate::render::labels;

/// Main-menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Search,
    MyProfile,
    Favorites,
}

/// One user action as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    Help,
    Menu(MenuItem),
    Back,
    Skip,
    Text(String),
    Button(Payload),
    /// Callback data that does not decode to a known payload.
    UnknownButton(String),
}

impl Input {
    pub fn from_event(event: &InboundEvent) -> Self {
        match &event.kind {
            EventKind::TextMessage { text } => Self::from_text(text),
            EventKind::ButtonPress { callback_data } => match callback_data.parse::<Payload>() {
                Ok(Payload::Back) => Self::Back,
                Ok(Payload::Skip) => Self::Skip,
                Ok(payload) => Self::Button(payload),
                Err(_) => Self::UnknownButton(callback_data.clone()),
            },
        }
    }

    pub fn from_text(text: &str) -> Self {
        let text = text.trim();

        // Commands may carry a bot-name suffix in group chats: /start@my_bot
        if let Some(command) = text.strip_prefix('/') {
            let name = command
                .split(|c: char| c == '@' || c.is_whitespace())
                .next()
                .unwrap_or_default();
            match name {
                "start" => return Self::Start,
                "help" => return Self::Help,
                _ => {}
            }
        }

        match text {
            labels::SEARCH => Self::Menu(MenuItem::Search),
            labels::MY_PROFILE => Self::Menu(MenuItem::MyProfile),
            labels::FAVORITES => Self::Menu(MenuItem::Favorites),
            labels::BACK => Self::Back,
            t if t.eq_ignore_ascii_case("back") => Self::Back,
            t if t.eq_ignore_ascii_case(labels::SKIP) => Self::Skip,
            t => Self::Text(t.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands() {
        assert_eq!(Input::from_text("/start"), Input::Start);
        assert_eq!(Input::from_text("  /help "), Input::Help);
        assert_eq!(Input::from_text("/start@cinema_bot"), Input::Start);
        assert_eq!(
            Input::from_text("/unknown"),
            Input::Text("/unknown".into())
        );
    }

    #[test]
    fn menu_labels() {
        assert_eq!(
            Input::from_text(labels::SEARCH),
            Input::Menu(MenuItem::Search)
        );
        assert_eq!(
            Input::from_text(labels::MY_PROFILE),
            Input::Menu(MenuItem::MyProfile)
        );
        assert_eq!(
            Input::from_text(labels::FAVORITES),
            Input::Menu(MenuItem::Favorites)
        );
        assert_eq!(Input::from_text(labels::BACK), Input::Back);
        assert_eq!(Input::from_text("back"), Input::Back);
        assert_eq!(Input::from_text(" BACK "), Input::Back);
        assert_eq!(Input::from_text("skip"), Input::Skip);
        assert_eq!(Input::from_text("Skip"), Input::Skip);
    }

    #[test]
    fn free_text_is_trimmed() {
        assert_eq!(Input::from_text("  Berlin "), Input::Text("Berlin".into()));
    }

    #[test]
    fn buttons() {
        let back = InboundEvent::button("cli", 1, 1, "back");
        assert_eq!(Input::from_event(&back), Input::Back);

        let dept = InboundEvent::button("cli", 1, 1, "dept:2");
        assert_eq!(
            Input::from_event(&dept),
            Input::Button(Payload::Department(2))
        );

        let junk = InboundEvent::button("cli", 1, 1, "dept_Sound");
        assert_eq!(
            Input::from_event(&junk),
            Input::UnknownButton("dept_Sound".into())
        );
    }
}
