use crate::options::ConnectionOptions;

/// Supplies raw connections to the pool and services them on its behalf.
///
/// The pool never touches a raw connection directly: opening, probing,
/// rolling back and closing all go through the manager, so any transport
/// offering these operations can be pooled.
pub trait Manager: Send + Sync + 'static {
    type Connection: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new raw connection for `options`, authenticated as
    /// `username`/`password`.
    fn connect(
        &self,
        options: &ConnectionOptions,
        username: &str,
        password: &str,
    ) -> Result<Self::Connection, Self::Error>;

    /// Cheap transport-level check, without a round trip to the server.
    fn is_open(&self, conn: &Self::Connection) -> bool;

    /// Whether `conn` commits every statement as it executes.
    fn is_auto_commit(&self, conn: &Self::Connection) -> bool;

    /// Roll back whatever transaction is open on `conn`.
    fn rollback(&self, conn: &mut Self::Connection) -> Result<(), Self::Error>;

    /// Run the liveness probe `query` on `conn`.
    fn ping(&self, conn: &mut Self::Connection, query: &str) -> Result<(), Self::Error>;

    /// Tear down `conn` and release its server-side resources.
    fn close(&self, conn: Self::Connection) -> Result<(), Self::Error>;
}
