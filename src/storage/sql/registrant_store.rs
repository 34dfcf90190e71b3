//! Unified SQL RegistrantStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.
//!
//! All race prevention lives here: inserts carry their uniqueness checks,
//! the credit increment is a single UPDATE evaluated by the database, and
//! `credit_referral` wraps edge insert + increment in one transaction.

use std::marker::PhantomData;

use chrono::{DateTime, SecondsFormat, Utc};

use super::SqlDatabase;
use crate::interfaces::registrant_store::Result;
use crate::interfaces::{ConflictField, StoreError};

/// SQL-based implementation of RegistrantStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlRegistrantStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlRegistrantStore<DB> {
    /// Create a new SQL registrant store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// Fixed-width RFC 3339 UTC, so TEXT ordering matches chronological ordering.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidTimestamp(format!("{raw}: {e}")))
}

/// Map a unique-constraint violation to the domain error for the violated
/// field. Keys on the constraint name where the backend reports one
/// (PostgreSQL) and on the error message otherwise (SQLite reports
/// `UNIQUE constraint failed: table.column`).
fn unique_conflict(err: &sqlx::Error) -> Option<StoreError> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    let what = db_err
        .constraint()
        .map(str::to_owned)
        .unwrap_or_else(|| db_err.message().to_owned());

    if what.contains("referral_edges") || what.contains("referred_id") {
        Some(StoreError::EdgeExists)
    } else if what.contains("email") {
        Some(StoreError::UniqueViolation(ConflictField::Email))
    } else if what.contains("username") {
        Some(StoreError::UniqueViolation(ConflictField::Username))
    } else if what.contains("referral_code") {
        Some(StoreError::UniqueViolation(ConflictField::ReferralCode))
    } else {
        None
    }
}

/// Macro to implement RegistrantStore for a specific SQL backend.
///
/// `$begin` is the transaction-open statement: SQLite uses `BEGIN IMMEDIATE`
/// to acquire the write lock upfront, preventing deadlocks when concurrent
/// DEFERRED transactions race to upgrade from shared to exclusive.
macro_rules! impl_registrant_store {
    ($db_type:ty, $feature:literal, $row:ty, $qb:expr, begin: $begin:literal) => {
        #[cfg(feature = $feature)]
        impl SqlRegistrantStore<$db_type> {
            /// Create the tables and indexes if they do not exist.
            pub async fn init(&self) -> Result<()> {
                sqlx::raw_sql(crate::storage::schema::CREATE_TABLES)
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }

            fn decode_registrant(row: &$row) -> Result<crate::model::Registrant> {
                use sqlx::Row;

                let id: String = row.get("id");
                let created_at: String = row.get("created_at");
                Ok(crate::model::Registrant {
                    id: uuid::Uuid::parse_str(&id)?,
                    full_name: row.get("full_name"),
                    email: row.get("email"),
                    username: row.get("username"),
                    phone: row.get("phone"),
                    source: row.get("source"),
                    referral_code: row.get("referral_code"),
                    referred_by_code: row.get("referred_by_code"),
                    referral_count: row.get("referral_count"),
                    bonus_units: row.get("bonus_units"),
                    created_at: parse_ts(&created_at)?,
                })
            }

            async fn find_where(
                &self,
                column: crate::storage::schema::Registrants,
                value: &str,
            ) -> Result<Option<crate::model::Registrant>> {
                use sea_query::{Expr, Query};
                use sea_query_binder::SqlxBinder;

                use crate::storage::schema::Registrants;

                let stmt = Query::select()
                    .column(sea_query::Asterisk)
                    .from(Registrants::Table)
                    .and_where(Expr::col(column).eq(value))
                    .limit(1)
                    .to_owned();

                let (sql, values) = stmt.build_sqlx($qb);
                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(&self.pool)
                    .await?;

                match row {
                    Some(row) => Ok(Some(Self::decode_registrant(&row)?)),
                    None => Ok(None),
                }
            }

            /// The atomic credit statement: `referral_count + 1`, with
            /// `bonus_units` recomputed from the pre-update count in the same
            /// statement (`1 + new_count` == `old_count + 2`). Never
            /// read-modify-write.
            fn increment_stmt(registrant_id: uuid::Uuid) -> sea_query::UpdateStatement {
                use sea_query::{Expr, Query};

                use crate::storage::schema::Registrants;

                Query::update()
                    .table(Registrants::Table)
                    .value(
                        Registrants::ReferralCount,
                        Expr::col(Registrants::ReferralCount).add(1),
                    )
                    .value(
                        Registrants::BonusUnits,
                        Expr::col(Registrants::ReferralCount).add(2),
                    )
                    .and_where(Expr::col(Registrants::Id).eq(registrant_id.to_string()))
                    .to_owned()
            }

            fn edge_insert_stmt(
                referrer_id: uuid::Uuid,
                referred_id: uuid::Uuid,
                code: &str,
            ) -> sea_query::InsertStatement {
                use sea_query::Query;

                use crate::storage::schema::ReferralEdges;

                Query::insert()
                    .into_table(ReferralEdges::Table)
                    .columns([
                        ReferralEdges::Id,
                        ReferralEdges::ReferrerId,
                        ReferralEdges::ReferredId,
                        ReferralEdges::ReferralCode,
                        ReferralEdges::CreatedAt,
                    ])
                    .values_panic([
                        uuid::Uuid::new_v4().to_string().into(),
                        referrer_id.to_string().into(),
                        referred_id.to_string().into(),
                        code.into(),
                        fmt_ts(chrono::Utc::now()).into(),
                    ])
                    .to_owned()
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::interfaces::RegistrantStore for SqlRegistrantStore<$db_type> {
            async fn insert_registrant(
                &self,
                candidate: crate::model::NewRegistrant,
            ) -> Result<crate::model::Registrant> {
                use sea_query::Query;
                use sea_query_binder::SqlxBinder;

                use crate::storage::schema::Registrants;

                // Round-trip through the stored representation so the
                // returned registrant carries exactly the persisted
                // (microsecond) timestamp.
                let created_raw = fmt_ts(chrono::Utc::now());
                let registrant = crate::model::Registrant {
                    id: uuid::Uuid::new_v4(),
                    full_name: candidate.full_name,
                    email: candidate.email,
                    username: candidate.username,
                    phone: candidate.phone,
                    source: candidate.source,
                    referral_code: candidate.referral_code,
                    referred_by_code: candidate.referred_by_code,
                    referral_count: 0,
                    bonus_units: 1,
                    created_at: parse_ts(&created_raw)?,
                };

                let stmt = Query::insert()
                    .into_table(Registrants::Table)
                    .columns([
                        Registrants::Id,
                        Registrants::FullName,
                        Registrants::Email,
                        Registrants::Username,
                        Registrants::Phone,
                        Registrants::Source,
                        Registrants::ReferralCode,
                        Registrants::ReferredByCode,
                        Registrants::ReferralCount,
                        Registrants::BonusUnits,
                        Registrants::CreatedAt,
                    ])
                    .values_panic([
                        registrant.id.to_string().into(),
                        registrant.full_name.clone().into(),
                        registrant.email.clone().into(),
                        registrant.username.clone().into(),
                        registrant.phone.clone().into(),
                        registrant.source.clone().into(),
                        registrant.referral_code.clone().into(),
                        registrant.referred_by_code.clone().into(),
                        registrant.referral_count.into(),
                        registrant.bonus_units.into(),
                        created_raw.into(),
                    ])
                    .to_owned();

                let (sql, values) = stmt.build_sqlx($qb);
                match sqlx::query_with(&sql, values).execute(&self.pool).await {
                    Ok(_) => Ok(registrant),
                    Err(e) => Err(unique_conflict(&e).unwrap_or(StoreError::Database(e))),
                }
            }

            async fn find_by_referral_code(
                &self,
                code: &str,
            ) -> Result<Option<crate::model::Registrant>> {
                self.find_where(crate::storage::schema::Registrants::ReferralCode, code)
                    .await
            }

            async fn find_by_email(
                &self,
                email: &str,
            ) -> Result<Option<crate::model::Registrant>> {
                self.find_where(crate::storage::schema::Registrants::Email, email)
                    .await
            }

            async fn increment_referral_credit(&self, registrant_id: uuid::Uuid) -> Result<()> {
                use sea_query_binder::SqlxBinder;

                let (sql, values) = Self::increment_stmt(registrant_id).build_sqlx($qb);
                let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound { id: registrant_id });
                }
                Ok(())
            }

            async fn insert_referral_edge(
                &self,
                referrer_id: uuid::Uuid,
                referred_id: uuid::Uuid,
                code: &str,
            ) -> Result<()> {
                use sea_query_binder::SqlxBinder;

                let (sql, values) =
                    Self::edge_insert_stmt(referrer_id, referred_id, code).build_sqlx($qb);
                match sqlx::query_with(&sql, values).execute(&self.pool).await {
                    Ok(_) => Ok(()),
                    Err(e) => Err(unique_conflict(&e).unwrap_or(StoreError::Database(e))),
                }
            }

            async fn credit_referral(
                &self,
                referrer_id: uuid::Uuid,
                referred_id: uuid::Uuid,
                code: &str,
            ) -> Result<crate::interfaces::CreditOutcome> {
                use sea_query_binder::SqlxBinder;

                use crate::interfaces::CreditOutcome;

                let mut conn = self.pool.acquire().await?;
                sqlx::query($begin).execute(&mut *conn).await?;

                let (sql, values) =
                    Self::edge_insert_stmt(referrer_id, referred_id, code).build_sqlx($qb);
                if let Err(e) = sqlx::query_with(&sql, values).execute(&mut *conn).await {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    return match unique_conflict(&e) {
                        // A concurrent or retried attribution already wrote
                        // this registrant's edge; absorb without incrementing.
                        Some(StoreError::EdgeExists) => Ok(CreditOutcome::AlreadyAttributed),
                        Some(other) => Err(other),
                        None => Err(StoreError::Database(e)),
                    };
                }

                let (sql, values) = Self::increment_stmt(referrer_id).build_sqlx($qb);
                let incremented = match sqlx::query_with(&sql, values).execute(&mut *conn).await {
                    Ok(result) => result.rows_affected(),
                    Err(e) => {
                        let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                        return Err(StoreError::Database(e));
                    }
                };
                if incremented == 0 {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    return Err(StoreError::NotFound { id: referrer_id });
                }

                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(CreditOutcome::Credited)
            }

            async fn referrals_of(
                &self,
                referrer_id: uuid::Uuid,
            ) -> Result<Vec<crate::model::ReferredEntry>> {
                use sea_query::{Alias, Expr, Order, Query};
                use sea_query_binder::SqlxBinder;
                use sqlx::Row;

                use crate::storage::schema::{ReferralEdges, Registrants};

                let stmt = Query::select()
                    .columns([
                        (Registrants::Table, Registrants::FullName),
                        (Registrants::Table, Registrants::Username),
                        (Registrants::Table, Registrants::Email),
                    ])
                    .expr_as(
                        Expr::col((ReferralEdges::Table, ReferralEdges::CreatedAt)),
                        Alias::new("referred_at"),
                    )
                    .from(ReferralEdges::Table)
                    .inner_join(
                        Registrants::Table,
                        Expr::col((ReferralEdges::Table, ReferralEdges::ReferredId))
                            .equals((Registrants::Table, Registrants::Id)),
                    )
                    .and_where(
                        Expr::col((ReferralEdges::Table, ReferralEdges::ReferrerId))
                            .eq(referrer_id.to_string()),
                    )
                    .order_by(
                        (ReferralEdges::Table, ReferralEdges::CreatedAt),
                        Order::Desc,
                    )
                    .order_by((ReferralEdges::Table, ReferralEdges::Id), Order::Desc)
                    .to_owned();

                let (sql, values) = stmt.build_sqlx($qb);
                let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

                let mut entries = Vec::with_capacity(rows.len());
                for row in rows {
                    let referred_at: String = row.get("referred_at");
                    entries.push(crate::model::ReferredEntry {
                        full_name: row.get("full_name"),
                        username: row.get("username"),
                        email: row.get("email"),
                        created_at: parse_ts(&referred_at)?,
                    });
                }
                Ok(entries)
            }

            async fn list_ranked(
                &self,
                limit: Option<u64>,
            ) -> Result<Vec<crate::model::Registrant>> {
                use sea_query::{Order, Query};
                use sea_query_binder::SqlxBinder;

                use crate::storage::schema::Registrants;

                let mut stmt = Query::select()
                    .column(sea_query::Asterisk)
                    .from(Registrants::Table)
                    .order_by(Registrants::ReferralCount, Order::Desc)
                    .order_by(Registrants::CreatedAt, Order::Asc)
                    .order_by(Registrants::Id, Order::Asc)
                    .to_owned();
                if let Some(limit) = limit {
                    stmt.limit(limit);
                }

                let (sql, values) = stmt.build_sqlx($qb);
                let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

                rows.iter().map(Self::decode_registrant).collect()
            }

            async fn count_registrants(&self) -> Result<u64> {
                use sea_query::{Expr, Query};
                use sea_query_binder::SqlxBinder;
                use sqlx::Row;

                use crate::storage::schema::Registrants;

                let stmt = Query::select()
                    .expr(Expr::col(Registrants::Id).count())
                    .from(Registrants::Table)
                    .to_owned();
                let (sql, values) = stmt.build_sqlx($qb);
                let row = sqlx::query_with(&sql, values).fetch_one(&self.pool).await?;
                let count: i64 = row.get(0);
                Ok(count as u64)
            }

            async fn count_edges(&self) -> Result<u64> {
                use sea_query::{Expr, Query};
                use sea_query_binder::SqlxBinder;
                use sqlx::Row;

                use crate::storage::schema::ReferralEdges;

                let stmt = Query::select()
                    .expr(Expr::col(ReferralEdges::Id).count())
                    .from(ReferralEdges::Table)
                    .to_owned();
                let (sql, values) = stmt.build_sqlx($qb);
                let row = sqlx::query_with(&sql, values).fetch_one(&self.pool).await?;
                let count: i64 = row.get(0);
                Ok(count as u64)
            }

            async fn source_breakdown(&self) -> Result<Vec<(String, u64)>> {
                use sea_query::{Alias, Expr, Order, Query};
                use sea_query_binder::SqlxBinder;
                use sqlx::Row;

                use crate::storage::schema::Registrants;

                let stmt = Query::select()
                    .column(Registrants::Source)
                    .expr_as(Expr::col(Registrants::Id).count(), Alias::new("cnt"))
                    .from(Registrants::Table)
                    .and_where(Expr::col(Registrants::Source).is_not_null())
                    .group_by_col(Registrants::Source)
                    .order_by(Alias::new("cnt"), Order::Desc)
                    .order_by(Registrants::Source, Order::Asc)
                    .to_owned();

                let (sql, values) = stmt.build_sqlx($qb);
                let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

                Ok(rows
                    .iter()
                    .map(|row| {
                        let source: String = row.get("source");
                        let count: i64 = row.get("cnt");
                        (source, count as u64)
                    })
                    .collect())
            }
        }
    };
}

// Generate implementations for each SQL backend.
impl_registrant_store!(
    super::postgres::Postgres,
    "postgres",
    sqlx::postgres::PgRow,
    sea_query::PostgresQueryBuilder,
    begin: "BEGIN"
);
impl_registrant_store!(
    super::sqlite::Sqlite,
    "sqlite",
    sqlx::sqlite::SqliteRow,
    sea_query::SqliteQueryBuilder,
    begin: "BEGIN IMMEDIATE"
);
