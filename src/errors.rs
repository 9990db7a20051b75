use thiserror::Error;

/// Fatal error kinds of the object store, packfile decoder and clone driver.
///
/// Usage errors belong to clap; everything here propagates unchanged to the
/// top-level handler. Nothing is retried and no partial state is rolled back.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("corrupt object {hash}: {reason}")]
    Corrupt { hash: String, reason: String },

    #[error("corrupt packfile: {0}")]
    CorruptPack(String),

    #[error("corrupt delta: {0}")]
    DeltaCorrupt(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unresolved deltas: {0}")]
    Unresolved(String),
}

impl GitError {
    pub fn corrupt(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        GitError::Corrupt {
            hash: hash.into(),
            reason: reason.into(),
        }
    }
}
