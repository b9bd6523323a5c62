use crate::exec::ExecError;

/// Failure taxonomy for gateway operations.
///
/// Read paths (client lists, live peers, system status) swallow unreadable
/// state and degrade to empty results instead of failing; these variants
/// surface from mutation paths and explicit lookups.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("server is not configured yet")]
    NotConfigured,

    #[error("client name must contain only letters, numbers, hyphens and underscores")]
    InvalidName,

    #[error("client '{0}' already exists")]
    AlreadyExists(String),

    #[error("client '{0}' not found")]
    NotFound(String),

    #[error("no available addresses in subnet")]
    PoolExhausted,

    #[error("tunnel is not running")]
    NotRunning,

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("QR encoding failed: {0}")]
    Qr(String),
}
