use thiserror::Error;

use ollachat_core::ProviderError;
use ollachat_session::SessionStoreError;

/// Chat orchestration errors. `EmptyUserName` and construction-time
/// `Session` failures are fatal at startup; `Provider` failures mid-loop are
/// recoverable and leave the user's message in history.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("user name cannot be empty")]
    EmptyUserName,

    #[error("input cannot be empty")]
    EmptyInput,

    #[error("no messages to send")]
    NoMessages,

    #[error(transparent)]
    Session(#[from] SessionStoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
