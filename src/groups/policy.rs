//! Grouping policy: partition an eligible pool into fixed-size peer groups.
//!
//! Pure and synchronous. Randomness is injected so runs are reproducible in tests.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::CourseId;
use super::names::{generate_name, ADJECTIVES, NOUNS};
use super::types::{CourseOutcome, EligibleStudent, NewGroup, PoolStatus};
use super::GroupError;

pub const DEFAULT_GROUP_SIZE: usize = 4;
pub const MIN_GROUP_SIZE: usize = 2;

/// Validated group size (always `>= MIN_GROUP_SIZE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct GroupSize(usize);

impl GroupSize {
    pub fn new(size: usize) -> Result<Self, GroupError> {
        if size < MIN_GROUP_SIZE {
            return Err(GroupError::InvalidGroupSize(size));
        }
        Ok(Self(size))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for GroupSize {
    fn default() -> Self {
        Self(DEFAULT_GROUP_SIZE)
    }
}

impl TryFrom<usize> for GroupSize {
    type Error = GroupError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<GroupSize> for usize {
    fn from(size: GroupSize) -> usize {
        size.0
    }
}

/// In-memory result of planning a run, before anything is persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormationPlan {
    pub groups: Vec<NewGroup>,
    pub courses: Vec<CourseOutcome>,
}

impl FormationPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

/// Partition `pool` into groups of exactly `size` students.
///
/// Students of different courses are never mixed. When `course_filter` is set,
/// students from other courses are ignored and the requested course always gets
/// an outcome, even if nobody is eligible. Each course is shuffled, chunked and
/// the short tail is left ungrouped for a future run; the first student of each
/// chunk leads it.
pub fn plan_groups<R: Rng + ?Sized>(
    pool: Vec<EligibleStudent>,
    course_filter: Option<CourseId>,
    size: GroupSize,
    separator: &str,
    rng: &mut R,
) -> FormationPlan {
    let size = size.get();

    let mut by_course: BTreeMap<CourseId, Vec<EligibleStudent>> = BTreeMap::new();
    if let Some(course) = course_filter {
        by_course.entry(course).or_default();
    }
    for student in pool {
        if course_filter.is_some_and(|course| course != student.course_id) {
            continue;
        }
        by_course.entry(student.course_id).or_default().push(student);
    }

    let mut plan = FormationPlan::default();
    for (course_id, mut students) in by_course {
        let eligible = students.len();
        if eligible < size {
            plan.courses.push(CourseOutcome {
                course_id,
                eligible,
                groups_formed: 0,
                ungrouped: eligible,
                status: PoolStatus::InsufficientPool,
            });
            continue;
        }

        students.shuffle(rng);

        let mut formed = 0;
        for chunk in students.chunks_exact(size) {
            plan.groups.push(NewGroup {
                name: generate_name(rng, ADJECTIVES, NOUNS, separator),
                course_id,
                members: chunk.to_vec(),
            });
            formed += 1;
        }

        plan.courses.push(CourseOutcome {
            course_id,
            eligible,
            groups_formed: formed,
            ungrouped: eligible % size,
            status: PoolStatus::Formed,
        });
    }

    plan
}
