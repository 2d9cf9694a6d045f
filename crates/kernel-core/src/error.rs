use contracts::{ApiError, ErrorCode};
use thiserror::Error;

/// Every way an engine operation can be refused. Operations return one of these
/// before touching any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("item already owned: {0}")]
    AlreadyOwned(String),
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },
    #[error("account {0} already belongs to a guild")]
    AlreadyInGuild(String),
    #[error("a friend request or friendship already links {from} and {to}")]
    DuplicateRequest { from: String, to: String },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("guild {guild_id} is full (capacity {capacity})")]
    GuildFull { guild_id: String, capacity: usize },
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("stale write on {account_id}: expected version {expected}, found {found}")]
    Conflict {
        account_id: String,
        expected: u64,
        found: u64,
    },
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::AlreadyOwned(_) => ErrorCode::AlreadyOwned,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::AlreadyInGuild(_) => ErrorCode::AlreadyInGuild,
            Self::DuplicateRequest { .. } => ErrorCode::DuplicateRequest,
            Self::InvalidTarget(_) => ErrorCode::InvalidTarget,
            Self::GuildFull { .. } => ErrorCode::GuildFull,
            Self::LimitExceeded(_) => ErrorCode::LimitExceeded,
            Self::Conflict { .. } => ErrorCode::VersionConflict,
            Self::UnsupportedVersion(_) => ErrorCode::ContractVersionUnsupported,
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.code(), self.to_string(), None)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_wire_codes() {
        let err = EngineError::InsufficientFunds {
            required: 50,
            available: 40,
        };
        assert_eq!(err.code(), ErrorCode::InsufficientFunds);
        let api = err.to_api_error();
        assert!(api.message.contains("need 50"));
    }
}
