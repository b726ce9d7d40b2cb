//! In-memory enrollment directory and group store.
//!
//! Backs the test suites and the `--memory` development server. Mutations work
//! on a staged copy that is swapped in only when the whole batch succeeds, so
//! injected failures leave no partial state behind.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::auth::Role;

use super::error::StoreError;
use super::ids::{CourseId, GroupId, StudentId};
use super::store::{EnrollmentDirectory, FormationRun, GroupStore, Planner};
use super::types::{
    EligibleStudent, GroupFilter, GroupView, MemberView, MembershipRemoval, NewGroup, PeerGroup,
};

#[derive(Clone, Debug)]
struct UserRecord {
    fullname: String,
    email: String,
    role: Role,
    course_id: Option<CourseId>,
}

#[derive(Clone, Copy, Debug)]
struct Membership {
    seq: u64,
    group_id: GroupId,
}

#[derive(Clone, Debug, Default)]
struct State {
    users: BTreeMap<StudentId, UserRecord>,
    groups: BTreeMap<GroupId, PeerGroup>,
    memberships: BTreeMap<StudentId, Membership>,
    next_group_id: i64,
    next_seq: u64,
    /// Fail `insert_groups` once this many rows have been written in one batch.
    fail_after_rows: Option<usize>,
}

impl State {
    fn member_view(&self, student: StudentId) -> MemberView {
        match self.users.get(&student) {
            Some(user) => MemberView {
                id: student,
                fullname: user.fullname.clone(),
                email: user.email.clone(),
            },
            None => MemberView {
                id: student,
                fullname: String::new(),
                email: String::new(),
            },
        }
    }

    fn eligible(&self, course: Option<CourseId>) -> Vec<EligibleStudent> {
        self.users
            .iter()
            .filter(|(id, user)| user.role == Role::Student && !self.memberships.contains_key(*id))
            .filter_map(|(id, user)| {
                let course_id = user.course_id?;
                if course.is_some_and(|c| c != course_id) {
                    return None;
                }
                Some(EligibleStudent {
                    id: *id,
                    fullname: user.fullname.clone(),
                    email: user.email.clone(),
                    course_id,
                })
            })
            .collect()
    }

    /// Apply a batch to a staged copy; `self` is only replaced when every row lands.
    fn insert_batch(&mut self, groups: &[NewGroup]) -> Result<Vec<PeerGroup>, StoreError> {
        let mut staged = self.clone();
        let mut written = 0usize;
        let mut created = Vec::with_capacity(groups.len());

        let mut write_row = |staged: &State| -> Result<(), StoreError> {
            if staged.fail_after_rows.is_some_and(|limit| written >= limit) {
                return Err(StoreError::Unavailable(format!(
                    "injected failure after {} rows",
                    written
                )));
            }
            written += 1;
            Ok(())
        };

        for group in groups {
            write_row(&staged)?;
            staged.next_group_id += 1;
            let row = PeerGroup {
                id: GroupId(staged.next_group_id),
                name: group.name.clone(),
                course_id: group.course_id,
                leader_id: Some(group.leader().id),
                created_at: Utc::now(),
            };
            staged.groups.insert(row.id, row.clone());

            for member in &group.members {
                write_row(&staged)?;
                if staged.memberships.contains_key(&member.id) {
                    return Err(StoreError::Conflict(format!(
                        "student {} already belongs to a peer group",
                        member.id
                    )));
                }
                staged.next_seq += 1;
                let seq = staged.next_seq;
                staged.memberships.insert(member.id, Membership { seq, group_id: row.id });
            }
            created.push(row);
        }

        *self = staged;
        Ok(created)
    }

    fn view(&self, group: &PeerGroup) -> GroupView {
        let mut rows: Vec<(u64, StudentId)> = self
            .memberships
            .iter()
            .filter(|(_, m)| m.group_id == group.id)
            .map(|(student, m)| (m.seq, *student))
            .collect();
        rows.sort_unstable();

        GroupView {
            id: group.id,
            name: group.name.clone(),
            course_id: group.course_id,
            leader: group.leader_id.map(|leader| self.member_view(leader)),
            members: rows.into_iter().map(|(_, student)| self.member_view(student)).collect(),
            created_at: group.created_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with the student role enrolled in `course`.
    pub async fn enroll(&self, id: StudentId, fullname: &str, email: &str, course: CourseId) {
        self.add_user(id, fullname, email, Role::Student, Some(course)).await;
    }

    pub async fn add_user(
        &self,
        id: StudentId,
        fullname: &str,
        email: &str,
        role: Role,
        course: Option<CourseId>,
    ) {
        let mut state = self.state.write().await;
        state.users.insert(
            id,
            UserRecord {
                fullname: fullname.to_string(),
                email: email.to_string(),
                role,
                course_id: course,
            },
        );
    }

    /// Make the next batches fail after `rows` group or membership rows.
    pub async fn fail_after_rows(&self, rows: Option<usize>) {
        self.state.write().await.fail_after_rows = rows;
    }

    /// Number of membership rows held by `student` (0 or 1).
    pub async fn memberships_of(&self, student: StudentId) -> usize {
        usize::from(self.state.read().await.memberships.contains_key(&student))
    }

    pub async fn membership_count(&self) -> usize {
        self.state.read().await.memberships.len()
    }

    pub async fn group_count(&self) -> usize {
        self.state.read().await.groups.len()
    }
}

#[async_trait]
impl EnrollmentDirectory for MemoryStore {
    async fn list_eligible_students(
        &self,
        course: Option<CourseId>,
    ) -> Result<Vec<EligibleStudent>, StoreError> {
        Ok(self.state.read().await.eligible(course))
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn insert_groups(&self, groups: &[NewGroup]) -> Result<Vec<PeerGroup>, StoreError> {
        self.state.write().await.insert_batch(groups)
    }

    async fn run_formation(
        &self,
        course: Option<CourseId>,
        planner: Planner<'_>,
    ) -> Result<FormationRun, StoreError> {
        // The write guard spans read, plan and insert.
        let mut state = self.state.write().await;
        let pool = state.eligible(course);
        let eligible = pool.len();
        let plan = planner(pool);
        let rows = state.insert_batch(&plan.groups)?;
        Ok(FormationRun { eligible, plan, rows })
    }

    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<GroupView>, StoreError> {
        let state = self.state.read().await;
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(state
            .groups
            .values()
            .filter(|g| filter.course_id.map_or(true, |c| g.course_id == c))
            .skip(offset)
            .take(limit)
            .map(|g| state.view(g))
            .collect())
    }

    async fn get_group(&self, group_id: GroupId) -> Result<Option<GroupView>, StoreError> {
        let state = self.state.read().await;
        Ok(state.groups.get(&group_id).map(|g| state.view(g)))
    }

    async fn find_group_for_student(&self, student: StudentId) -> Result<Option<GroupId>, StoreError> {
        Ok(self.state.read().await.memberships.get(&student).map(|m| m.group_id))
    }

    async fn delete_all_groups(&self) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let removed = state.groups.len() as u64;
        state.groups.clear();
        state.memberships.clear();
        Ok(removed)
    }

    async fn delete_group(&self, group_id: GroupId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.groups.remove(&group_id).is_none() {
            return Ok(false);
        }
        state.memberships.retain(|_, m| m.group_id != group_id);
        Ok(true)
    }

    async fn remove_member(&self, student: StudentId) -> Result<Option<MembershipRemoval>, StoreError> {
        let mut state = self.state.write().await;
        let Some(membership) = state.memberships.remove(&student) else {
            return Ok(None);
        };
        let group_id = membership.group_id;

        let successor = state
            .memberships
            .iter()
            .filter(|(_, m)| m.group_id == group_id)
            .min_by_key(|(_, m)| m.seq)
            .map(|(id, _)| *id);
        let remaining_members = state
            .memberships
            .values()
            .filter(|m| m.group_id == group_id)
            .count();

        let leader_id = match state.groups.get_mut(&group_id) {
            Some(group) => {
                if group.leader_id == Some(student) {
                    group.leader_id = successor;
                }
                group.leader_id
            }
            None => None,
        };

        Ok(Some(MembershipRemoval {
            group_id,
            student_id: student,
            remaining_members,
            leader_id,
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
