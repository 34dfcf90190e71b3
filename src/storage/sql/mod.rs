//! Unified SQL storage implementations.
//!
//! This module provides a shared implementation for SQL-based storage
//! backends (PostgreSQL, SQLite), parameterized by database type using the
//! `SqlDatabase` trait and instantiated per backend with a macro.

mod registrant_store;

pub use registrant_store::SqlRegistrantStore;

/// Marker trait tying a backend to its sqlx pool type.
pub trait SqlDatabase: Send + Sync + 'static {
    type Pool: Clone + Send + Sync;
}

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = sqlx::PgPool;
    }

    /// PostgreSQL registrant store.
    pub type PostgresRegistrantStore = super::SqlRegistrantStore<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = sqlx::SqlitePool;
    }

    /// SQLite registrant store.
    pub type SqliteRegistrantStore = super::SqlRegistrantStore<Sqlite>;
}
