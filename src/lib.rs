//! A bounded, self-healing pool for expensive, slow-to-create database
//! connections.
//!
//! The pool bounds concurrent checkouts, reuses idle connections in FIFO
//! order, forcibly reclaims connections held past a configurable checkout
//! budget, optionally probes idle connections for liveness before reuse,
//! and exposes cumulative usage metrics.
//!
//! Raw connections are produced and serviced by a [`Manager`]
//! implementation and handed out as [`PooledConnection`] handles whose only
//! release path is `Drop`; the application never holds a disposer for the
//! raw resource itself.
//!
//! ```no_run
//! use reservoir::{ConnectionOptions, Manager, Pool, PoolConfig};
//!
//! struct TcpManager;
//!
//! impl Manager for TcpManager {
//!     type Connection = std::net::TcpStream;
//!     type Error = std::io::Error;
//!
//!     fn connect(
//!         &self,
//!         options: &ConnectionOptions,
//!         _username: &str,
//!         _password: &str,
//!     ) -> Result<Self::Connection, Self::Error> {
//!         std::net::TcpStream::connect(options.url())
//!     }
//!
//!     fn is_open(&self, conn: &Self::Connection) -> bool {
//!         conn.peer_addr().is_ok()
//!     }
//!
//!     fn is_auto_commit(&self, _conn: &Self::Connection) -> bool {
//!         true
//!     }
//!
//!     fn rollback(&self, _conn: &mut Self::Connection) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//!
//!     fn ping(&self, _conn: &mut Self::Connection, _query: &str) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//!
//!     fn close(&self, _conn: Self::Connection) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ConnectionOptions::builder()
//!         .url("127.0.0.1:5432")
//!         .credentials("app", "secret")
//!         .build();
//!     let pool = Pool::builder()
//!         .options(options)
//!         .config(PoolConfig::new(16, 4))
//!         .build(TcpManager);
//!
//!     let conn = pool.acquire()?;
//!     conn.raw()?.set_nodelay(true)?;
//!     drop(conn);
//!     Ok(())
//! }
//! ```

pub mod options;
pub mod pool;

pub use crate::options::{ConnectionOptions, ConnectionOptionsBuilder};
pub use crate::pool::config::PoolConfig;
pub use crate::pool::connection::{PooledConnection, RawConnection};
pub use crate::pool::error::PoolError;
pub use crate::pool::manager::Manager;
pub use crate::pool::state::PoolMetrics;
pub use crate::pool::{Pool, PoolBuilder};
