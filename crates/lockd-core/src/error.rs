//! Error taxonomy shared by the directory, handshake, monitor and router.

/// Failures surfaced by lockd components.
///
/// `DuplicateKey` never reaches a caller of the router: the handshake
/// treats it as a lost first-contact race and discards it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("no device record for {0}")]
    NotFound(String),

    #[error("a device record for {0} already exists")]
    DuplicateKey(String),

    #[error("no live connection bound to {0}")]
    DeviceUnreachable(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl LockError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, LockError::DuplicateKey(_))
    }
}
