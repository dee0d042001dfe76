mod catalog;
pub mod models;
mod queries;
mod sqlite;

pub use crate::lifecycle::FolderStatus;
pub use catalog::Catalog;
pub use models::*;
pub use sqlite::Database;
