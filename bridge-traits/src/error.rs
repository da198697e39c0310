use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the error means the asset does not exist, as opposed
    /// to a transport or platform failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            BridgeError::NotFound(_) => true,
            BridgeError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(BridgeError::NotFound("audio/bgm/x.ogg".into()).is_not_found());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(BridgeError::Io(io).is_not_found());
        assert!(!BridgeError::OperationFailed("HTTP 500".into()).is_not_found());
    }
}
