//! Scoped database sessions over a pooled PostgreSQL connection.

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, PooledConnection};
use diesel::PgConnection;

use crate::config::DatabaseConfig;
use crate::error::SessionError;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// One open unit of work against the database.
pub trait Session {
    /// Executes a raw statement, returning the number of affected rows.
    fn execute(&mut self, statement: &str) -> Result<usize, SessionError>;
}

/// Hands out scoped sessions.
///
/// `with_session` opens a session, runs `work` inside it, commits when
/// `work` succeeds and rolls back when it fails. The session is released
/// before `with_session` returns on every path.
pub trait SessionProvider: Send + Sync {
    fn with_session(
        &self,
        work: &mut dyn FnMut(&mut dyn Session) -> Result<(), SessionError>,
    ) -> Result<(), SessionError>;

    fn status(&self) -> PoolStatus;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub connections: u32,
    pub idle: u32,
}

impl PoolStatus {
    pub fn in_use(&self) -> u32 {
        self.connections.saturating_sub(self.idle)
    }
}

#[derive(Clone)]
pub struct PgSessionProvider {
    pool: DbPool,
}

impl PgSessionProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

struct PgSession<'a> {
    conn: &'a mut PgPooledConnection,
}

impl Session for PgSession<'_> {
    fn execute(&mut self, statement: &str) -> Result<usize, SessionError> {
        Ok(diesel::sql_query(statement).execute(&mut *self.conn)?)
    }
}

impl SessionProvider for PgSessionProvider {
    fn with_session(
        &self,
        work: &mut dyn FnMut(&mut dyn Session) -> Result<(), SessionError>,
    ) -> Result<(), SessionError> {
        // Dropping `conn` hands it back to the pool.
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| work(&mut PgSession { conn }))
    }

    fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle: state.idle_connections,
        }
    }
}

/// Builds the pool without connecting up front, so the service can start
/// while the database is down and report it through `/health`.
pub fn create_db_pool(config: &DatabaseConfig) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    r2d2::Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
        .build_unchecked(manager)
}
