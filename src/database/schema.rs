//! Tables owned by the peer-group service.
//!
//! Users, roles, student profiles and enrollments belong to other services and
//! are only read.

use sqlx::PgPool;
use tracing::info;

use super::DatabaseError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS peer_groups (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL,
        course_id   BIGINT NOT NULL,
        leader_id   BIGINT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS peer_groups_course_idx ON peer_groups (course_id)",
    r#"
    CREATE TABLE IF NOT EXISTS peer_group_members (
        id          BIGSERIAL PRIMARY KEY,
        user_id     BIGINT NOT NULL UNIQUE,
        group_id    BIGINT NOT NULL REFERENCES peer_groups (id) ON DELETE CASCADE,
        joined_at   TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS peer_group_members_group_idx ON peer_group_members (group_id)",
];

/// Create the peer-group tables if they are missing. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("Peer group schema ready");
    Ok(())
}
