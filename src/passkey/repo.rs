//! Postgres-backed collaborators.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE users (
//!     email           TEXT PRIMARY KEY,
//!     secret          TEXT,
//!     is_suspended    BOOLEAN NOT NULL DEFAULT FALSE,
//!     suspended_until TIMESTAMPTZ
//! );
//!
//! CREATE TABLE enrollments (
//!     email         TEXT PRIMARY KEY,
//!     password_hash BYTEA NOT NULL,
//!     salt          BYTEA NOT NULL,
//!     pin           TEXT NOT NULL,
//!     idp           TEXT NOT NULL,
//!     is_enrolled   BOOLEAN
//! );
//!
//! CREATE TABLE security_questions (
//!     email     TEXT PRIMARY KEY,
//!     question1 TEXT NOT NULL, answer1 TEXT NOT NULL,
//!     question2 TEXT NOT NULL, answer2 TEXT NOT NULL,
//!     question3 TEXT NOT NULL, answer3 TEXT NOT NULL
//! );
//! ```
//!
//! `enrollments.is_enrolled` is deliberately nullable; see
//! [`super::store::EnrollmentStatus`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::store::{
    EnrollmentRecord, EnrollmentStatus, EnrollmentStore, Notifier, SecretStore, SecurityQuestions,
};

/// Shared-secret lookups against the `users` table.
#[derive(Clone)]
pub struct PgSecretStore {
    pool: PgPool,
}

impl PgSecretStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn get_secret(&self, identity: &str) -> Result<Option<SecretString>> {
        let query = "SELECT secret FROM users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch secret")?;

        // A row with a NULL secret means the identity never finished
        // enrollment; treat it the same as no row.
        Ok(row
            .and_then(|row| row.get::<Option<String>, _>("secret"))
            .map(SecretString::from))
    }

    async fn persist_suspension(&self, identity: &str, until: DateTime<Utc>) -> Result<()> {
        let query = r"
            UPDATE users
            SET is_suspended = TRUE,
                suspended_until = $2
            WHERE email = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identity)
            .bind(until)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to persist suspension")?;
        Ok(())
    }
}

/// Enrollment records against the `enrollments` and `security_questions`
/// tables.
#[derive(Clone)]
pub struct PgEnrollmentStore {
    pool: PgPool,
}

impl PgEnrollmentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentStore for PgEnrollmentStore {
    async fn get(&self, identity: &str) -> Result<Option<EnrollmentRecord>> {
        let query = r"
            SELECT email, password_hash, salt, pin, idp, is_enrolled
            FROM enrollments
            WHERE email = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch enrollment record")?;

        Ok(row.map(|row| EnrollmentRecord {
            identity: row.get("email"),
            password_hash: row.get("password_hash"),
            salt: row.get("salt"),
            pin: row.get("pin"),
            idp: row.get("idp"),
            status: EnrollmentStatus::from_flag(row.get("is_enrolled")),
        }))
    }

    async fn upsert(
        &self,
        record: &EnrollmentRecord,
        questions: Option<&SecurityQuestions>,
    ) -> Result<()> {
        // Record and questions land in one transaction so a partial write
        // cannot strand questions for credentials that were never stored.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin enrollment transaction")?;

        let query = r"
            INSERT INTO enrollments (email, password_hash, salt, pin, idp, is_enrolled)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET password_hash = EXCLUDED.password_hash,
                salt = EXCLUDED.salt,
                pin = EXCLUDED.pin,
                idp = EXCLUDED.idp,
                is_enrolled = EXCLUDED.is_enrolled
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&record.identity)
            .bind(&record.password_hash)
            .bind(&record.salt)
            .bind(&record.pin)
            .bind(&record.idp)
            .bind(record.status.as_flag())
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to upsert enrollment record")?;

        if let Some(questions) = questions {
            let query = r"
                INSERT INTO security_questions
                    (email, question1, answer1, question2, answer2, question3, answer3)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (email) DO UPDATE
                SET question1 = EXCLUDED.question1, answer1 = EXCLUDED.answer1,
                    question2 = EXCLUDED.question2, answer2 = EXCLUDED.answer2,
                    question3 = EXCLUDED.question3, answer3 = EXCLUDED.answer3
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(&record.identity)
                .bind(&questions.question1)
                .bind(&questions.answer1)
                .bind(&questions.question2)
                .bind(&questions.answer2)
                .bind(&questions.question3)
                .bind(&questions.answer3)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to upsert security questions")?;
        }

        tx.commit()
            .await
            .context("failed to commit enrollment transaction")?;
        Ok(())
    }
}

/// Notifier that enqueues the PIN into the `enrollment_outbox` table; the
/// background worker in [`crate::api::outbox`] handles delivery and retries.
#[derive(Clone)]
pub struct OutboxNotifier {
    pool: PgPool,
}

impl OutboxNotifier {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send_enrollment_code(&self, identity: &str, pin: &str) -> Result<()> {
        let query = r"
            INSERT INTO enrollment_outbox (to_email, pin)
            VALUES ($1, $2)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identity)
            .bind(pin)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to enqueue enrollment code")?;
        Ok(())
    }
}
