//! Records exchanged between the grouping policy, the stores and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CourseId, GroupId, StudentId};

/// A student the enrollment directory reports as eligible for grouping:
/// holds the student role, is enrolled in `course_id` and has no membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EligibleStudent {
    pub id: StudentId,
    pub fullname: String,
    pub email: String,
    pub course_id: CourseId,
}

/// A group computed by the policy but not yet persisted.
///
/// `members[0]` is always the leader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub course_id: CourseId,
    pub members: Vec<EligibleStudent>,
}

impl NewGroup {
    pub fn leader(&self) -> &EligibleStudent {
        &self.members[0]
    }
}

/// Persisted peer group row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PeerGroup {
    pub id: GroupId,
    pub name: String,
    pub course_id: CourseId,
    pub leader_id: Option<StudentId>,
    pub created_at: DateTime<Utc>,
}

/// Roster entry: identity plus contact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub id: StudentId,
    pub fullname: String,
    pub email: String,
}

/// A group with its leader and full roster, in membership order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupView {
    pub id: GroupId,
    pub name: String,
    pub course_id: CourseId,
    pub leader: Option<MemberView>,
    pub members: Vec<MemberView>,
    pub created_at: DateTime<Utc>,
}

impl GroupView {
    pub fn has_member(&self, student: StudentId) -> bool {
        self.members.iter().any(|m| m.id == student)
    }
}

/// Listing filter. `None` everywhere returns every group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFilter {
    pub course_id: Option<CourseId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Outcome of removing one student's membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRemoval {
    pub group_id: GroupId,
    pub student_id: StudentId,
    pub remaining_members: usize,
    /// Leader after the removal; `None` once the group is empty.
    pub leader_id: Option<StudentId>,
}

/// One created group as reported to the caller of a grouping run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedGroup {
    pub id: GroupId,
    pub name: String,
    pub course_id: CourseId,
    pub leader_id: StudentId,
    pub member_ids: Vec<StudentId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Formed,
    /// Fewer eligible students than the group size; nothing was written for the course.
    InsufficientPool,
}

/// Per-course accounting for a grouping run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub course_id: CourseId,
    pub eligible: usize,
    pub groups_formed: usize,
    pub ungrouped: usize,
    pub status: PoolStatus,
}

/// Result of `form_groups`: created groups plus what happened per course.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFormationResult {
    pub group_size: usize,
    pub groups: Vec<CreatedGroup>,
    pub courses: Vec<CourseOutcome>,
}

impl GroupFormationResult {
    pub fn outcome_for(&self, course: CourseId) -> Option<&CourseOutcome> {
        self.courses.iter().find(|c| c.course_id == course)
    }
}
