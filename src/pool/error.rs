use thiserror::Error;

/// Errors surfaced while acquiring or using a pooled connection.
#[derive(Debug, Error)]
pub enum PoolError<E>
where
    E: std::error::Error + 'static,
{
    /// Opening a brand new raw connection failed.
    #[error("failed to open a new connection")]
    Connect(#[source] E),

    /// Every candidate the pool produced during one acquire was unusable.
    #[error("gave up after {attempts} consecutive bad connections")]
    TooManyBadConnections { attempts: u32 },

    /// The pool was closed while the caller was acquiring.
    #[error("connection pool is closed")]
    Cancelled,

    /// The handle was invalidated by a reclaim, a drain or its own release.
    #[error("connection handle is no longer valid")]
    InvalidConnection,

    /// The acquire loop finished without a connection and without a reason.
    #[error("connection pool produced neither a connection nor an error")]
    Internal,
}
