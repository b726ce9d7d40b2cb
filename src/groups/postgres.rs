//! Postgres-backed enrollment directory and group store.

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::debug;

use super::error::StoreError;
use super::ids::{CourseId, GroupId, StudentId};
use super::store::{EnrollmentDirectory, FormationRun, GroupStore, Planner};
use super::types::{
    EligibleStudent, GroupFilter, GroupView, MemberView, MembershipRemoval, NewGroup, PeerGroup,
};

/// Advisory lock key shared by every process forming groups against the same database.
const FORMATION_LOCK_KEY: i64 = 0x6d65_7269_6772_7073;

const ELIGIBLE_STUDENTS_SQL: &str = r#"
    SELECT u.id, COALESCE(p.fullname, '') AS fullname, u.email, e.course_id
    FROM users u
    JOIN roles r ON r.id = u.role_id
    JOIN enrollments e ON e.student_id = u.id
    LEFT JOIN student_profiles p ON p.id = u.id
    WHERE r.role = 'student'
      AND ($1::BIGINT IS NULL OR e.course_id = $1)
      AND NOT EXISTS (SELECT 1 FROM peer_group_members m WHERE m.user_id = u.id)
    ORDER BY e.course_id, u.id
"#;

const GROUP_COLUMNS: &str = "id, name, course_id, leader_id, created_at";

#[derive(Debug, FromRow)]
struct MemberRow {
    group_id: GroupId,
    id: StudentId,
    fullname: String,
    email: String,
}

pub struct PgGroupStore {
    pool: PgPool,
}

impl PgGroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a formation transaction holding the cross-process advisory lock.
    ///
    /// Stays at READ COMMITTED: a SERIALIZABLE snapshot would be taken by the
    /// lock statement itself and hide rows committed while it waited.
    async fn begin_formation(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(FORMATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(tx)
    }

    async fn rosters(&self, groups: Vec<PeerGroup>) -> Result<Vec<GroupView>, StoreError> {
        if groups.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = groups.iter().map(|g| g.id.0).collect();

        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT m.group_id, u.id, COALESCE(p.fullname, '') AS fullname, u.email
            FROM peer_group_members m
            JOIN users u ON u.id = m.user_id
            LEFT JOIN student_profiles p ON p.id = u.id
            WHERE m.group_id = ANY($1)
            ORDER BY m.id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        let mut by_group: HashMap<GroupId, Vec<MemberView>> = HashMap::new();
        for row in rows {
            by_group.entry(row.group_id).or_default().push(MemberView {
                id: row.id,
                fullname: row.fullname,
                email: row.email,
            });
        }

        Ok(groups
            .into_iter()
            .map(|group| {
                let members = by_group.remove(&group.id).unwrap_or_default();
                let leader = group
                    .leader_id
                    .and_then(|leader| members.iter().find(|m| m.id == leader).cloned());
                GroupView {
                    id: group.id,
                    name: group.name,
                    course_id: group.course_id,
                    leader,
                    members,
                    created_at: group.created_at,
                }
            })
            .collect())
    }
}

#[async_trait]
impl EnrollmentDirectory for PgGroupStore {
    async fn list_eligible_students(
        &self,
        course: Option<CourseId>,
    ) -> Result<Vec<EligibleStudent>, StoreError> {
        sqlx::query_as::<_, EligibleStudent>(ELIGIBLE_STUDENTS_SQL)
            .bind(course)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)
    }
}

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn insert_groups(&self, groups: &[NewGroup]) -> Result<Vec<PeerGroup>, StoreError> {
        let mut tx = self.begin_formation().await?;
        let created = insert_batch(&mut *tx, groups).await?;
        // Dropping `tx` on any early return above rolls the whole batch back.
        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(created)
    }

    async fn run_formation(
        &self,
        course: Option<CourseId>,
        planner: Planner<'_>,
    ) -> Result<FormationRun, StoreError> {
        let mut tx = self.begin_formation().await?;

        // Read under the lock so this run sees every membership committed before it.
        let pool = sqlx::query_as::<_, EligibleStudent>(ELIGIBLE_STUDENTS_SQL)
            .bind(course)
            .fetch_all(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        let eligible = pool.len();

        let plan = planner(pool);
        let rows = insert_batch(&mut *tx, &plan.groups).await?;
        tx.commit().await.map_err(StoreError::from_sqlx)?;

        Ok(FormationRun { eligible, plan, rows })
    }

    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<GroupView>, StoreError> {
        let groups = sqlx::query_as::<_, PeerGroup>(&format!(
            "SELECT {} FROM peer_groups WHERE ($1::BIGINT IS NULL OR course_id = $1) ORDER BY id LIMIT $2 OFFSET $3",
            GROUP_COLUMNS
        ))
        .bind(filter.course_id)
        .bind(filter.limit)
        .bind(filter.offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        self.rosters(groups).await
    }

    async fn get_group(&self, group_id: GroupId) -> Result<Option<GroupView>, StoreError> {
        let group = sqlx::query_as::<_, PeerGroup>(&format!(
            "SELECT {} FROM peer_groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        match group {
            Some(group) => Ok(self.rosters(vec![group]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_group_for_student(&self, student: StudentId) -> Result<Option<GroupId>, StoreError> {
        sqlx::query_scalar::<_, GroupId>("SELECT group_id FROM peer_group_members WHERE user_id = $1")
            .bind(student)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn delete_all_groups(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM peer_groups")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn delete_group(&self, group_id: GroupId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM peer_groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, student: StudentId) -> Result<Option<MembershipRemoval>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        let group_id = sqlx::query_scalar::<_, GroupId>(
            "DELETE FROM peer_group_members WHERE user_id = $1 RETURNING group_id",
        )
        .bind(student)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        let Some(group_id) = group_id else {
            return Ok(None);
        };

        // Lock the group row so concurrent leaves agree on the successor.
        let leader_id = sqlx::query_scalar::<_, Option<StudentId>>(
            "SELECT leader_id FROM peer_groups WHERE id = $1 FOR UPDATE",
        )
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?
        .flatten();

        let leader_id = if leader_id == Some(student) {
            let successor = sqlx::query_scalar::<_, StudentId>(
                "SELECT user_id FROM peer_group_members WHERE group_id = $1 ORDER BY id LIMIT 1",
            )
            .bind(group_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;

            sqlx::query("UPDATE peer_groups SET leader_id = $2 WHERE id = $1")
                .bind(group_id)
                .bind(successor)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
            successor
        } else {
            leader_id
        };

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM peer_group_members WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;

        tx.commit().await.map_err(StoreError::from_sqlx)?;

        Ok(Some(MembershipRemoval {
            group_id,
            student_id: student,
            remaining_members: usize::try_from(remaining).unwrap_or_default(),
            leader_id,
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}

async fn insert_batch(conn: &mut PgConnection, groups: &[NewGroup]) -> Result<Vec<PeerGroup>, StoreError> {
    let mut created = Vec::with_capacity(groups.len());
    for group in groups {
        let row = sqlx::query_as::<_, PeerGroup>(&format!(
            "INSERT INTO peer_groups (name, course_id, leader_id) VALUES ($1, $2, $3) RETURNING {}",
            GROUP_COLUMNS
        ))
        .bind(&group.name)
        .bind(group.course_id)
        .bind(group.leader().id)
        .fetch_one(&mut *conn)
        .await
        .map_err(StoreError::from_sqlx)?;

        for member in &group.members {
            sqlx::query("INSERT INTO peer_group_members (user_id, group_id) VALUES ($1, $2)")
                .bind(member.id)
                .bind(row.id)
                .execute(&mut *conn)
                .await
                .map_err(StoreError::from_sqlx)?;
        }
        debug!("Staged peer group {} ({}) with {} members", row.id, row.name, group.members.len());
        created.push(row);
    }
    Ok(created)
}
