//! The storage seams the peer-group service depends on.
//!
//! Backends (`PgGroupStore`, `MemoryStore`) implement these traits so the
//! service doesn't depend on any specific database engine or schema details.

use async_trait::async_trait;

use super::error::StoreError;
use super::ids::{CourseId, GroupId, StudentId};
use super::policy::FormationPlan;
use super::types::{EligibleStudent, GroupFilter, GroupView, MembershipRemoval, NewGroup, PeerGroup};

/// Turns the eligible pool seen inside a formation run into the groups to insert.
pub type Planner<'a> = &'a (dyn Fn(Vec<EligibleStudent>) -> FormationPlan + Send + Sync);

/// A committed formation run: the plan and the group rows written for it.
#[derive(Debug)]
pub struct FormationRun {
    pub eligible: usize,
    pub plan: FormationPlan,
    pub rows: Vec<PeerGroup>,
}

/// Read-only view of course enrollment.
#[async_trait]
pub trait EnrollmentDirectory: Send + Sync {
    /// Students holding the student role, enrolled in a course (optionally only
    /// `course`), and not currently in any peer group.
    async fn list_eligible_students(
        &self,
        course: Option<CourseId>,
    ) -> Result<Vec<EligibleStudent>, StoreError>;
}

/// Transactional persistence for peer groups and memberships.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Insert every group and membership of one run atomically.
    ///
    /// Either all rows are committed or none are. A student already holding a
    /// membership makes the whole batch fail with `StoreError::Conflict`.
    async fn insert_groups(&self, groups: &[NewGroup]) -> Result<Vec<PeerGroup>, StoreError>;

    /// Read the eligible pool, plan it and insert the plan as one serialized unit.
    ///
    /// Runs against the same backend queue behind each other, so every run sees
    /// the memberships committed by the one before it.
    async fn run_formation(
        &self,
        course: Option<CourseId>,
        planner: Planner<'_>,
    ) -> Result<FormationRun, StoreError>;

    /// Groups with leader and roster, oldest first.
    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<GroupView>, StoreError>;

    async fn get_group(&self, group_id: GroupId) -> Result<Option<GroupView>, StoreError>;

    /// Resolve the group holding `student`'s membership, if any.
    async fn find_group_for_student(&self, student: StudentId) -> Result<Option<GroupId>, StoreError>;

    /// Remove every group (memberships cascade). Returns the number of groups removed.
    async fn delete_all_groups(&self) -> Result<u64, StoreError>;

    /// Remove one group and its memberships. Returns `false` when it did not exist.
    async fn delete_group(&self, group_id: GroupId) -> Result<bool, StoreError>;

    /// Remove only `student`'s membership; the group row stays.
    ///
    /// When the leader leaves, leadership passes to the earliest-joined
    /// remaining member, or is cleared when nobody remains.
    async fn remove_member(&self, student: StudentId) -> Result<Option<MembershipRemoval>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
