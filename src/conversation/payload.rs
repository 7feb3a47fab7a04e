//! Typed button payloads.
//!
//! Payloads only ever carry numeric arguments (catalog indices, user ids), so
//! department or profession names can never collide with the `:` delimiter.
//! Telegram limits callback data to 64 bytes; every variant stays well below.

use std::fmt;
use std::str::FromStr;

use crate::store::UserId;

/// Favorite toggle direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteAction {
    Add,
    Remove,
}

impl FavoriteAction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Add => Self::Remove,
            Self::Remove => Self::Add,
        }
    }
}

/// Data attached to an inline button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Department(usize),
    Profession { department: usize, profession: usize },
    Experience(usize),
    Back,
    Skip,
    Favorite { action: FavoriteAction, target: UserId },
    EditProfile,
    DeleteProfile,
    ConfirmDelete,
    CancelDelete,
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Department(i) => write!(f, "dept:{i}"),
            Self::Profession {
                department,
                profession,
            } => write!(f, "prof:{department}:{profession}"),
            Self::Experience(i) => write!(f, "exp:{i}"),
            Self::Back => write!(f, "back"),
            Self::Skip => write!(f, "skip"),
            Self::Favorite {
                action: FavoriteAction::Add,
                target,
            } => write!(f, "fav:add:{target}"),
            Self::Favorite {
                action: FavoriteAction::Remove,
                target,
            } => write!(f, "fav:remove:{target}"),
            Self::EditProfile => write!(f, "profile:edit"),
            Self::DeleteProfile => write!(f, "profile:delete"),
            Self::ConfirmDelete => write!(f, "delete:confirm"),
            Self::CancelDelete => write!(f, "delete:cancel"),
        }
    }
}

/// Error for callback data that does not decode to a known payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised button payload: {0}")]
pub struct PayloadParseError(pub String);

impl FromStr for Payload {
    type Err = PayloadParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PayloadParseError(s.to_string());
        let parts: Vec<&str> = s.split(':').collect();

        let payload = match parts.as_slice() {
            ["dept", i] => Self::Department(i.parse().map_err(|_| err())?),
            ["prof", d, p] => Self::Profession {
                department: d.parse().map_err(|_| err())?,
                profession: p.parse().map_err(|_| err())?,
            },
            ["exp", i] => Self::Experience(i.parse().map_err(|_| err())?),
            ["back"] => Self::Back,
            ["skip"] => Self::Skip,
            ["fav", action, target] => Self::Favorite {
                action: match *action {
                    "add" => FavoriteAction::Add,
                    "remove" => FavoriteAction::Remove,
                    _ => return Err(err()),
                },
                target: target.parse().map_err(|_| err())?,
            },
            ["profile", "edit"] => Self::EditProfile,
            ["profile", "delete"] => Self::DeleteProfile,
            ["delete", "confirm"] => Self::ConfirmDelete,
            ["delete", "cancel"] => Self::CancelDelete,
            _ => return Err(err()),
        };
        Ok(payload)
    }
}
