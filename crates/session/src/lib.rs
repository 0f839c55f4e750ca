mod error;
mod store;

pub use error::SessionStoreError;
pub use store::{sanitize_user_name, Session, SessionStore};
