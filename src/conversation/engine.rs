//! Conversation engine: drives the per-user state machine.
//!
//! `handle()` locks the user's session for the whole event, computes the
//! next state from a copy of the current one, and only commits it when the
//! step succeeds. A rejected or failed step therefore never leaves a
//! half-applied draft behind.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::channels::{EventKind, InboundEvent};
use crate::conversation::favorites;
use crate::conversation::input::{Input, MenuItem};
use crate::conversation::payload::Payload;
use crate::conversation::prompts;
use crate::conversation::session::SessionStore;
use crate::conversation::state::{
    ConversationState, ProfileDraft, ProfileStep, SearchDraft, SearchStep,
};
use crate::error::ConversationError;
use crate::render::{self, Keyboard, Outgoing, RenderRequest, Rendered};
use crate::store::{ChatId, ProfileStore, ProfileUpdate, SearchCriteria, UserId};

/// Who sent the event being handled and how.
struct Turn<'a> {
    user_id: UserId,
    chat_id: ChatId,
    handle: &'a str,
    via_button: bool,
}

/// Outcome of a successful step.
struct Transition {
    state: ConversationState,
    replies: Vec<Outgoing>,
}

impl Transition {
    fn new(state: ConversationState, replies: Vec<Outgoing>) -> Self {
        Self { state, replies }
    }

    fn idle(replies: Vec<Outgoing>) -> Self {
        Self::new(ConversationState::Idle, replies)
    }
}

type StepResult = Result<Transition, ConversationError>;

/// The conversation engine. Cheap to share behind an `Arc`.
pub struct ConversationEngine {
    store: Arc<dyn ProfileStore>,
    catalog: Arc<Catalog>,
    sessions: Arc<SessionStore>,
}

impl ConversationEngine {
    pub fn new(store: Arc<dyn ProfileStore>, catalog: Arc<Catalog>) -> Self {
        Self {
            store,
            catalog,
            sessions: Arc::new(SessionStore::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound event and return the replies to deliver, in order.
    ///
    /// Never fails: every error becomes a user-facing reply.
    pub async fn handle(&self, event: &InboundEvent) -> Vec<Outgoing> {
        let input = Input::from_event(event);
        let turn = Turn {
            user_id: event.user_id,
            chat_id: event.chat_id,
            handle: &event.handle,
            via_button: matches!(event.kind, EventKind::ButtonPress { .. }),
        };

        let mut session = self.sessions.lock(event.user_id).await;
        let current = session.clone();
        tracing::debug!(
            user_id = event.user_id,
            state = %current,
            input = ?input,
            "Handling input"
        );

        match self.step(&turn, current.clone(), input).await {
            Ok(transition) => {
                if transition.state != current {
                    tracing::debug!(
                        user_id = event.user_id,
                        from = %current,
                        to = %transition.state,
                        "State transition"
                    );
                }
                *session = transition.state;
                transition.replies
            }
            Err(ConversationError::Validation) => {
                match prompts::prompt_for(&self.catalog, &current, true) {
                    Some(rendered) => vec![self.prompt_reply(&turn, rendered)],
                    None => vec![menu_message(turn.chat_id, prompts::USE_MENU)],
                }
            }
            Err(ConversationError::NotFound { user_id }) => {
                tracing::info!(user_id, "Profile not found; returning to idle");
                *session = ConversationState::Idle;
                vec![menu_message(turn.chat_id, prompts::PROFILE_NOT_FOUND)]
            }
            Err(ConversationError::Storage(e)) => {
                tracing::warn!(
                    user_id = event.user_id,
                    state = %current,
                    error = %e,
                    "Storage failure while handling input"
                );
                vec![Outgoing::Send(RenderRequest::new(
                    turn.chat_id,
                    prompts::TRY_AGAIN,
                    Keyboard::None,
                ))]
            }
        }
    }

    async fn step(&self, turn: &Turn<'_>, state: ConversationState, input: Input) -> StepResult {
        // Commands and favorite toggles work regardless of wizard step.
        match input {
            Input::Start => return self.start(turn).await,
            Input::Help => {
                return Ok(Transition::idle(vec![menu_message(
                    turn.chat_id,
                    prompts::HELP,
                )]));
            }
            Input::Button(Payload::Favorite { action, target }) => {
                let replies = favorites::toggle(
                    self.store.as_ref(),
                    turn.user_id,
                    turn.chat_id,
                    target,
                    action,
                )
                .await?;
                return Ok(Transition::new(state, replies));
            }
            _ => {}
        }

        match state {
            ConversationState::Idle => self.idle(turn, input).await,
            ConversationState::Profile { step, draft } => {
                self.profile_step(turn, step, draft, input).await
            }
            ConversationState::Search { step, draft } => {
                self.search_step(turn, step, draft, input).await
            }
        }
    }

    // ── Idle ────────────────────────────────────────────────────────

    async fn start(&self, turn: &Turn<'_>) -> StepResult {
        self.store.upsert(turn.user_id, turn.handle).await?;
        tracing::info!(user_id = turn.user_id, "User started the bot");
        Ok(Transition::idle(vec![menu_message(
            turn.chat_id,
            prompts::WELCOME,
        )]))
    }

    async fn idle(&self, turn: &Turn<'_>, input: Input) -> StepResult {
        match input {
            Input::Menu(MenuItem::Search) => {
                let state = ConversationState::start_search();
                let reply = self.prompt_reply_for(turn, &state);
                Ok(Transition::new(state, reply))
            }
            Input::Menu(MenuItem::MyProfile) => self.show_own_profile(turn).await,
            Input::Menu(MenuItem::Favorites) => self.show_favorites(turn).await,
            Input::Button(Payload::EditProfile) => {
                if self.store.get(turn.user_id).await?.is_none() {
                    return Err(ConversationError::NotFound {
                        user_id: turn.user_id,
                    });
                }
                let state = ConversationState::start_profile();
                let reply = self.prompt_reply_for(turn, &state);
                Ok(Transition::new(state, reply))
            }
            Input::Button(Payload::DeleteProfile) => Ok(Transition::idle(vec![Outgoing::Replace(
                render::delete_confirmation().into_request(turn.chat_id),
            )])),
            Input::Button(Payload::ConfirmDelete) => {
                if !self.store.delete(turn.user_id).await? {
                    return Err(ConversationError::NotFound {
                        user_id: turn.user_id,
                    });
                }
                tracing::info!(user_id = turn.user_id, "Profile deleted");
                Ok(Transition::idle(vec![menu_message(
                    turn.chat_id,
                    prompts::PROFILE_DELETED,
                )]))
            }
            Input::Button(Payload::CancelDelete) => {
                let reply = match self.store.get(turn.user_id).await? {
                    Some(profile) => Outgoing::Replace(
                        Rendered {
                            text: render::own_profile_text(&profile, prompts::DELETE_CANCELLED),
                            buttons: render::owner_buttons(),
                        }
                        .into_request(turn.chat_id),
                    ),
                    None => menu_message(turn.chat_id, prompts::DELETE_CANCELLED),
                };
                Ok(Transition::idle(vec![reply]))
            }
            Input::Back => Ok(Transition::idle(vec![menu_message(
                turn.chat_id,
                prompts::MAIN_MENU,
            )])),
            Input::UnknownButton(data) => {
                tracing::debug!(user_id = turn.user_id, payload = %data, "Unknown button");
                Ok(Transition::idle(vec![Outgoing::Notice(
                    prompts::UNKNOWN_BUTTON.to_string(),
                )]))
            }
            _ => Ok(Transition::idle(vec![menu_message(
                turn.chat_id,
                prompts::USE_MENU,
            )])),
        }
    }

    async fn show_own_profile(&self, turn: &Turn<'_>) -> StepResult {
        let reply = match self.store.get(turn.user_id).await? {
            Some(profile) => Outgoing::Send(
                render::profile_card(&profile, turn.user_id, false).into_request(turn.chat_id),
            ),
            None => menu_message(turn.chat_id, prompts::PROFILE_NOT_FOUND),
        };
        Ok(Transition::idle(vec![reply]))
    }

    async fn show_favorites(&self, turn: &Turn<'_>) -> StepResult {
        let favorites = self.store.list_favorites(turn.user_id).await?;
        if favorites.is_empty() {
            return Ok(Transition::idle(vec![menu_message(
                turn.chat_id,
                prompts::NO_FAVORITES,
            )]));
        }

        let mut replies = Vec::with_capacity(favorites.len() + 1);
        replies.push(menu_message(turn.chat_id, prompts::FAVORITES_HEADER));
        for profile in &favorites {
            replies.push(Outgoing::Send(
                render::profile_card(profile, turn.user_id, true).into_request(turn.chat_id),
            ));
        }
        Ok(Transition::idle(replies))
    }

    // ── Profile wizard ──────────────────────────────────────────────

    async fn profile_step(
        &self,
        turn: &Turn<'_>,
        step: ProfileStep,
        mut draft: ProfileDraft,
        input: Input,
    ) -> StepResult {
        if input == Input::Back {
            return Ok(self.back(turn, ConversationState::Profile { step, draft }));
        }

        match step {
            ProfileStep::AwaitingDepartment => {
                let department = self.pick_department(&input)?;
                draft.set_department(department);
            }
            ProfileStep::AwaitingProfession => {
                let department = draft
                    .department
                    .as_deref()
                    .ok_or(ConversationError::Validation)?;
                draft.profession = Some(self.pick_profession(department, &input)?);
            }
            ProfileStep::AwaitingExperience => {
                draft.experience = Some(self.pick_experience(&input)?);
            }
            ProfileStep::AwaitingPortfolio => {
                draft.portfolio = Some(match input {
                    Input::Skip => String::new(),
                    Input::Text(text) if !text.is_empty() => text,
                    _ => return Err(ConversationError::Validation),
                });
            }
            ProfileStep::AwaitingLocation => {
                let location = match input {
                    Input::Text(text) if !text.is_empty() => text,
                    _ => return Err(ConversationError::Validation),
                };
                return self.commit_profile(turn, draft, location).await;
            }
        }

        let next = step.next().ok_or(ConversationError::Validation)?;
        let state = ConversationState::Profile { step: next, draft };
        let reply = self.prompt_reply_for(turn, &state);
        Ok(Transition::new(state, reply))
    }

    async fn commit_profile(
        &self,
        turn: &Turn<'_>,
        draft: ProfileDraft,
        location: String,
    ) -> StepResult {
        let update = ProfileUpdate {
            department: draft.department,
            profession: draft.profession,
            experience: draft.experience,
            portfolio: draft.portfolio,
            location: Some(location),
        };
        if !self.store.update_fields(turn.user_id, &update).await? {
            return Err(ConversationError::NotFound {
                user_id: turn.user_id,
            });
        }
        tracing::info!(user_id = turn.user_id, "Profile updated");
        Ok(Transition::idle(vec![menu_message(
            turn.chat_id,
            prompts::PROFILE_UPDATED,
        )]))
    }

    // ── Search wizard ───────────────────────────────────────────────

    async fn search_step(
        &self,
        turn: &Turn<'_>,
        step: SearchStep,
        mut draft: SearchDraft,
        input: Input,
    ) -> StepResult {
        if input == Input::Back {
            return Ok(self.back(turn, ConversationState::Search { step, draft }));
        }

        match step {
            SearchStep::AwaitingDepartment => {
                draft.department = Some(self.pick_department(&input)?);
                let next = step.next().ok_or(ConversationError::Validation)?;
                let state = ConversationState::Search { step: next, draft };
                let reply = self.prompt_reply_for(turn, &state);
                Ok(Transition::new(state, reply))
            }
            SearchStep::AwaitingProfession => {
                let department = draft.department.ok_or(ConversationError::Validation)?;
                let profession = self.pick_profession(&department, &input)?;
                self.run_search(turn, department, profession).await
            }
        }
    }

    async fn run_search(
        &self,
        turn: &Turn<'_>,
        department: String,
        profession: String,
    ) -> StepResult {
        let criteria = SearchCriteria::by_profession(department, profession);
        let results = self.store.search_by(&criteria).await?;
        tracing::info!(
            user_id = turn.user_id,
            department = criteria.department.as_deref().unwrap_or_default(),
            profession = criteria.profession.as_deref().unwrap_or_default(),
            count = results.len(),
            "Search completed"
        );

        if results.is_empty() {
            return Ok(Transition::idle(vec![menu_message(
                turn.chat_id,
                prompts::NOBODY_FOUND,
            )]));
        }

        let favorite_ids: HashSet<UserId> = self
            .store
            .list_favorites(turn.user_id)
            .await?
            .into_iter()
            .map(|p| p.user_id)
            .collect();

        let mut replies = Vec::with_capacity(results.len() + 1);
        replies.push(menu_message(
            turn.chat_id,
            &prompts::results_header(results.len()),
        ));
        for profile in &results {
            let is_favorite = favorite_ids.contains(&profile.user_id);
            replies.push(Outgoing::Send(
                render::profile_card(profile, turn.user_id, is_favorite)
                    .into_request(turn.chat_id),
            ));
        }
        Ok(Transition::idle(replies))
    }

    // ── Shared wizard helpers ───────────────────────────────────────

    fn back(&self, turn: &Turn<'_>, state: ConversationState) -> Transition {
        let state = state.back();
        if state.is_idle() {
            return Transition::idle(vec![menu_message(turn.chat_id, prompts::MAIN_MENU)]);
        }
        let reply = self.prompt_reply_for(turn, &state);
        Transition::new(state, reply)
    }

    fn pick_department(&self, input: &Input) -> Result<String, ConversationError> {
        let department = match input {
            Input::Text(text) => self.catalog.department(text),
            Input::Button(Payload::Department(i)) => self.catalog.department_at(*i),
            _ => None,
        };
        department
            .map(|d| d.name.clone())
            .ok_or(ConversationError::Validation)
    }

    fn pick_profession(
        &self,
        department: &str,
        input: &Input,
    ) -> Result<String, ConversationError> {
        match input {
            Input::Text(text) if self.catalog.contains_profession(department, text) => {
                Ok(text.clone())
            }
            Input::Button(Payload::Profession {
                department: d,
                profession: p,
            }) => self
                .catalog
                .department_at(*d)
                .filter(|dept| dept.name == department)
                .and_then(|dept| dept.professions.get(*p))
                .cloned()
                .ok_or(ConversationError::Validation),
            _ => Err(ConversationError::Validation),
        }
    }

    fn pick_experience(&self, input: &Input) -> Result<String, ConversationError> {
        match input {
            Input::Text(text) if self.catalog.contains_experience_band(text) => Ok(text.clone()),
            Input::Button(Payload::Experience(i)) => self
                .catalog
                .experience_band_at(*i)
                .map(str::to_string)
                .ok_or(ConversationError::Validation),
            _ => Err(ConversationError::Validation),
        }
    }

    /// Prompt for `state`, editing the pressed message when the input came
    /// from a button.
    fn prompt_reply_for(&self, turn: &Turn<'_>, state: &ConversationState) -> Vec<Outgoing> {
        prompts::prompt_for(&self.catalog, state, false)
            .map(|rendered| vec![self.prompt_reply(turn, rendered)])
            .unwrap_or_default()
    }

    fn prompt_reply(&self, turn: &Turn<'_>, rendered: Rendered) -> Outgoing {
        let request = rendered.into_request(turn.chat_id);
        if turn.via_button {
            Outgoing::Replace(request)
        } else {
            Outgoing::Send(request)
        }
    }
}

/// A plain message with the main-menu keyboard.
fn menu_message(chat_id: ChatId, text: &str) -> Outgoing {
    Outgoing::Send(RenderRequest::new(chat_id, text, render::main_menu()))
}
