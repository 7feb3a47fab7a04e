//! Persistence layer: libSQL-backed storage for profiles and favorites.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use model::{ChatId, ProfileUpdate, SearchCriteria, UserId, UserProfile};
pub use traits::ProfileStore;
