//! Conversation state machine: which wizard step a user is in.

use serde::{Deserialize, Serialize};

/// Steps of the edit-profile wizard.
///
/// Progresses linearly: AwaitingDepartment → AwaitingProfession →
/// AwaitingExperience → AwaitingPortfolio → AwaitingLocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStep {
    AwaitingDepartment,
    AwaitingProfession,
    AwaitingExperience,
    AwaitingPortfolio,
    AwaitingLocation,
}

impl ProfileStep {
    /// The next step, or `None` after the last one.
    pub fn next(&self) -> Option<ProfileStep> {
        use ProfileStep::*;
        match self {
            AwaitingDepartment => Some(AwaitingProfession),
            AwaitingProfession => Some(AwaitingExperience),
            AwaitingExperience => Some(AwaitingPortfolio),
            AwaitingPortfolio => Some(AwaitingLocation),
            AwaitingLocation => None,
        }
    }

    /// The preceding step, or `None` from the first one.
    pub fn previous(&self) -> Option<ProfileStep> {
        use ProfileStep::*;
        match self {
            AwaitingDepartment => None,
            AwaitingProfession => Some(AwaitingDepartment),
            AwaitingExperience => Some(AwaitingProfession),
            AwaitingPortfolio => Some(AwaitingExperience),
            AwaitingLocation => Some(AwaitingPortfolio),
        }
    }
}

impl std::fmt::Display for ProfileStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingDepartment => "awaiting_department",
            Self::AwaitingProfession => "awaiting_profession",
            Self::AwaitingExperience => "awaiting_experience",
            Self::AwaitingPortfolio => "awaiting_portfolio",
            Self::AwaitingLocation => "awaiting_location",
        };
        write!(f, "{s}")
    }
}

/// Steps of the search wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStep {
    AwaitingDepartment,
    AwaitingProfession,
}

impl SearchStep {
    pub fn next(&self) -> Option<SearchStep> {
        match self {
            Self::AwaitingDepartment => Some(Self::AwaitingProfession),
            Self::AwaitingProfession => None,
        }
    }

    pub fn previous(&self) -> Option<SearchStep> {
        match self {
            Self::AwaitingDepartment => None,
            Self::AwaitingProfession => Some(Self::AwaitingDepartment),
        }
    }
}

impl std::fmt::Display for SearchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingDepartment => "awaiting_department",
            Self::AwaitingProfession => "awaiting_profession",
        };
        write!(f, "{s}")
    }
}

/// Values collected so far by the edit-profile wizard.
///
/// Location is the last step and is committed directly, so it is never
/// buffered here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub department: Option<String>,
    pub profession: Option<String>,
    pub experience: Option<String>,
    pub portfolio: Option<String>,
}

impl ProfileDraft {
    /// Clear the field collected at `step` and every field after it.
    pub fn clear_from(&mut self, step: ProfileStep) {
        use ProfileStep::*;
        match step {
            AwaitingDepartment => *self = Self::default(),
            AwaitingProfession => {
                self.profession = None;
                self.experience = None;
                self.portfolio = None;
            }
            AwaitingExperience => {
                self.experience = None;
                self.portfolio = None;
            }
            AwaitingPortfolio => self.portfolio = None,
            AwaitingLocation => {}
        }
    }

    /// Record a department. Any profession picked for a previous department
    /// no longer applies.
    pub fn set_department(&mut self, department: String) {
        self.department = Some(department);
        self.profession = None;
    }
}

/// Filter collected so far by the search wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDraft {
    pub department: Option<String>,
}

/// Per-user conversation state. Held in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Profile {
        step: ProfileStep,
        draft: ProfileDraft,
    },
    Search {
        step: SearchStep,
        draft: SearchDraft,
    },
}

impl ConversationState {
    /// Fresh edit-profile wizard at its first step.
    pub fn start_profile() -> Self {
        Self::Profile {
            step: ProfileStep::AwaitingDepartment,
            draft: ProfileDraft::default(),
        }
    }

    /// Fresh search wizard at its first step.
    pub fn start_search() -> Self {
        Self::Search {
            step: SearchStep::AwaitingDepartment,
            draft: SearchDraft::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Step back one wizard step.
    ///
    /// Fields for the step returned to and every later step are cleared;
    /// earlier fields survive. Backing out of a first step yields `Idle`.
    pub fn back(self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Profile { step, mut draft } => match step.previous() {
                Some(prev) => {
                    draft.clear_from(prev);
                    Self::Profile { step: prev, draft }
                }
                None => Self::Idle,
            },
            Self::Search { step, mut draft } => match step.previous() {
                Some(SearchStep::AwaitingDepartment) => {
                    draft.department = None;
                    Self::Search {
                        step: SearchStep::AwaitingDepartment,
                        draft,
                    }
                }
                Some(SearchStep::AwaitingProfession) | None => Self::Idle,
            },
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Profile { step, .. } => write!(f, "profile/{step}"),
            Self::Search { step, .. } => write!(f, "search/{step}"),
        }
    }
}
