//! Fixed texts and per-step wizard prompts.

use crate::catalog::Catalog;
use crate::conversation::payload::Payload;
use crate::conversation::state::{
    ConversationState, ProfileDraft, ProfileStep, SearchDraft, SearchStep,
};
use crate::render::{Button, Rendered, labels};

pub const WELCOME: &str = "👋 Welcome to the film-industry colleague finder!\n\
You can create a profile and find specialists to work with.\n\n\
Available commands:\n\
/start - start using the bot\n\
/help - help\n\
Use the menu buttons to navigate.";

pub const HELP: &str = "Fill in your profile under \"👤 My profile\", find people under \
\"🔍 Search colleagues\" and keep the ones you want to work with in \"⭐ Favorites\".\n\n\
Use the menu buttons to navigate.";

pub const MAIN_MENU: &str = "Main menu:";
pub const USE_MENU: &str = "Use the menu buttons to navigate.";
pub const PROFILE_NOT_FOUND: &str = "Profile not found. Start with the /start command.";
pub const PROFILE_UPDATED: &str = "✅ Your profile has been updated!";
pub const PROFILE_DELETED: &str = "🗑️ Your profile has been deleted.";
pub const DELETE_CANCELLED: &str = "Profile deletion cancelled.";
pub const NO_FAVORITES: &str = "You have no favorite profiles yet.";
pub const FAVORITES_HEADER: &str = "Your favorite profiles:";
pub const NOBODY_FOUND: &str = "Nobody found. Try different search parameters.";
pub const TRY_AGAIN: &str = "⚠️ Something went wrong. Please try again.";
pub const UNKNOWN_BUTTON: &str = "This button is no longer valid.";

/// Header above search results.
pub fn results_header(count: usize) -> String {
    let noun = if count == 1 { "specialist" } else { "specialists" };
    format!("🔍 Found {count} {noun}:")
}

/// Buttons laid out `per_row` to a row.
fn rows(buttons: Vec<Button>, per_row: usize) -> Vec<Vec<Button>> {
    buttons
        .chunks(per_row.max(1))
        .map(<[Button]>::to_vec)
        .collect()
}

fn back_row() -> Vec<Button> {
    vec![Button::new(labels::BACK, Payload::Back)]
}

fn department_buttons(catalog: &Catalog) -> Vec<Vec<Button>> {
    let buttons: Vec<Button> = catalog
        .departments
        .iter()
        .enumerate()
        .map(|(i, d)| Button::new(d.name.clone(), Payload::Department(i)))
        .collect();
    let mut kb = rows(buttons, 2);
    kb.push(back_row());
    kb
}

fn profession_buttons(catalog: &Catalog, department: Option<&str>) -> Vec<Vec<Button>> {
    let buttons: Vec<Button> = department
        .and_then(|name| catalog.department_index(name))
        .and_then(|d| catalog.department_at(d).map(|dept| (d, dept)))
        .map(|(d, dept)| {
            dept.professions
                .iter()
                .enumerate()
                .map(|(p, name)| {
                    Button::new(
                        name.clone(),
                        Payload::Profession {
                            department: d,
                            profession: p,
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    let mut kb = rows(buttons, 2);
    kb.push(back_row());
    kb
}

fn experience_buttons(catalog: &Catalog) -> Vec<Vec<Button>> {
    let mut kb: Vec<Vec<Button>> = catalog
        .experience_bands
        .iter()
        .enumerate()
        .map(|(i, band)| vec![Button::new(band.clone(), Payload::Experience(i))])
        .collect();
    kb.push(back_row());
    kb
}

fn framed(question: &str, rejection: &str, retry: bool) -> String {
    if retry {
        format!("{rejection}\n\n{question}")
    } else {
        question.to_string()
    }
}

/// Prompt for one edit-profile step. `retry` adds the rejection line used
/// after invalid input.
pub fn profile_prompt(
    catalog: &Catalog,
    step: ProfileStep,
    draft: &ProfileDraft,
    retry: bool,
) -> Rendered {
    match step {
        ProfileStep::AwaitingDepartment => Rendered {
            text: framed(
                "Choose your department:",
                "Please choose a department from the list.",
                retry,
            ),
            buttons: department_buttons(catalog),
        },
        ProfileStep::AwaitingProfession => Rendered {
            text: framed(
                "Choose your profession:",
                "Please choose a profession from the list.",
                retry,
            ),
            buttons: profession_buttons(catalog, draft.department.as_deref()),
        },
        ProfileStep::AwaitingExperience => Rendered {
            text: framed(
                "How much experience do you have?",
                "Please choose an experience level from the list.",
                retry,
            ),
            buttons: experience_buttons(catalog),
        },
        ProfileStep::AwaitingPortfolio => Rendered {
            text: framed(
                "Send a link to your portfolio (if you have one):",
                "Please send a link or press Skip.",
                retry,
            ),
            buttons: vec![
                vec![Button::new(labels::SKIP, Payload::Skip)],
                back_row(),
            ],
        },
        ProfileStep::AwaitingLocation => Rendered {
            text: framed(
                "Where are you based (city)?",
                "Please enter your city.",
                retry,
            ),
            buttons: vec![back_row()],
        },
    }
}

/// Prompt for one search step.
pub fn search_prompt(
    catalog: &Catalog,
    step: SearchStep,
    draft: &SearchDraft,
    retry: bool,
) -> Rendered {
    match step {
        SearchStep::AwaitingDepartment => Rendered {
            text: framed(
                "Choose a department to search:",
                "Please choose a department from the list.",
                retry,
            ),
            buttons: department_buttons(catalog),
        },
        SearchStep::AwaitingProfession => Rendered {
            text: framed(
                "Choose a profession:",
                "Please choose a profession from the list.",
                retry,
            ),
            buttons: profession_buttons(catalog, draft.department.as_deref()),
        },
    }
}

/// Prompt for whatever step `state` is at. `None` when idle.
pub fn prompt_for(catalog: &Catalog, state: &ConversationState, retry: bool) -> Option<Rendered> {
    match state {
        ConversationState::Idle => None,
        ConversationState::Profile { step, draft } => {
            Some(profile_prompt(catalog, *step, draft, retry))
        }
        ConversationState::Search { step, draft } => {
            Some(search_prompt(catalog, *step, draft, retry))
        }
    }
}
