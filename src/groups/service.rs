//! Peer-group formation and lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::notify::{dispatch_batch, Notification, Notifier, GROUP_ASSIGNED};

use super::error::GroupError;
use super::ids::{CourseId, GroupId, StudentId};
use super::policy::{plan_groups, FormationPlan, GroupSize};
use super::store::{EnrollmentDirectory, FormationRun, GroupStore};
use super::types::{
    CreatedGroup, EligibleStudent, GroupFilter, GroupFormationResult, GroupView,
    MembershipRemoval, NewGroup,
};

/// Knobs for the service, usually taken from `config::GroupingConfig`.
#[derive(Debug, Clone)]
pub struct GroupingSettings {
    pub default_group_size: GroupSize,
    pub name_separator: String,
    pub max_list_limit: i64,
    pub max_concurrent_sends: usize,
}

impl Default for GroupingSettings {
    fn default() -> Self {
        Self {
            default_group_size: GroupSize::default(),
            name_separator: "-".to_string(),
            max_list_limit: 500,
            max_concurrent_sends: 8,
        }
    }
}

impl GroupingSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, GroupError> {
        Ok(Self {
            default_group_size: GroupSize::new(config.grouping.default_group_size)?,
            name_separator: config.grouping.name_separator.clone(),
            max_list_limit: config.grouping.max_list_limit,
            max_concurrent_sends: config.mail.max_concurrent_sends,
        })
    }
}

pub struct PeerGroupService {
    directory: Arc<dyn EnrollmentDirectory>,
    store: Arc<dyn GroupStore>,
    notifier: Arc<dyn Notifier>,
    settings: GroupingSettings,
    /// Serializes grouping runs issued through this process.
    run_lock: Mutex<()>,
}

impl PeerGroupService {
    pub fn new(
        directory: Arc<dyn EnrollmentDirectory>,
        store: Arc<dyn GroupStore>,
        notifier: Arc<dyn Notifier>,
        settings: GroupingSettings,
    ) -> Self {
        Self {
            directory,
            store,
            notifier,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &GroupingSettings {
        &self.settings
    }

    /// Form as many full groups as the eligible pool allows.
    ///
    /// All groups of the run are committed atomically before any notification
    /// is queued; notification failures never affect the returned result.
    pub async fn form_groups(
        &self,
        course: Option<CourseId>,
        group_size: Option<usize>,
    ) -> Result<GroupFormationResult, GroupError> {
        let size = match group_size {
            Some(size) => GroupSize::new(size)?,
            None => self.settings.default_group_size,
        };

        let _run = self.run_lock.lock().await;

        let separator = self.settings.name_separator.as_str();
        // ThreadRng is !Send; it lives only inside the synchronous planner.
        let planner = move |pool: Vec<EligibleStudent>| {
            let mut rng = rand::rng();
            plan_groups(pool, course, size, separator, &mut rng)
        };

        let run = self.store.run_formation(course, &planner).await.map_err(|e| {
            warn!("Grouping run rolled back: {}", e);
            GroupError::from(e)
        })?;
        let FormationRun { eligible, plan, rows } = run;

        for outcome in &plan.courses {
            info!(
                course = %outcome.course_id,
                eligible = outcome.eligible,
                groups = outcome.groups_formed,
                ungrouped = outcome.ungrouped,
                "Grouping outcome ({:?})",
                outcome.status
            );
        }

        if plan.is_empty() {
            info!("Grouping run formed no groups from {} eligible students", eligible);
            return Ok(GroupFormationResult {
                group_size: size.get(),
                groups: vec![],
                courses: plan.courses,
            });
        }

        let students = plan.member_count();
        let FormationPlan { groups, courses } = plan;
        let created: Vec<CreatedGroup> = rows
            .into_iter()
            .zip(groups.iter())
            .map(|(row, planned)| CreatedGroup {
                id: row.id,
                name: row.name,
                course_id: row.course_id,
                leader_id: planned.leader().id,
                member_ids: planned.members.iter().map(|m| m.id).collect(),
            })
            .collect();

        info!(
            "Formed {} peer groups ({} students) with group size {}",
            created.len(),
            students,
            size.get()
        );

        dispatch_batch(
            Arc::clone(&self.notifier),
            assignment_notifications(&groups),
            self.settings.max_concurrent_sends,
        );

        Ok(GroupFormationResult {
            group_size: size.get(),
            groups: created,
            courses,
        })
    }

    /// Cap the limit by settings and floor limit and offset at zero.
    pub fn list_filter(&self, filter: GroupFilter) -> GroupFilter {
        GroupFilter {
            limit: filter
                .limit
                .map(|limit| limit.min(self.settings.max_list_limit).max(0)),
            offset: filter.offset.map(|offset| offset.max(0)),
            ..filter
        }
    }

    /// Every group with leader and roster; the limit is capped by settings.
    pub async fn get_all_groups(&self, filter: GroupFilter) -> Result<Vec<GroupView>, GroupError> {
        let filter = self.list_filter(filter);
        Ok(self.store.list_groups(&filter).await?)
    }

    /// Students currently eligible for a run, optionally restricted to `course`.
    pub async fn eligible_students(
        &self,
        course: Option<CourseId>,
    ) -> Result<Vec<EligibleStudent>, GroupError> {
        Ok(self.directory.list_eligible_students(course).await?)
    }

    pub async fn get_group_by_id(&self, group_id: GroupId) -> Result<GroupView, GroupError> {
        self.store
            .get_group(group_id)
            .await?
            .ok_or(GroupError::GroupNotFound(group_id))
    }

    pub async fn get_group_for_student(&self, student: StudentId) -> Result<GroupView, GroupError> {
        let group_id = self
            .store
            .find_group_for_student(student)
            .await?
            .ok_or(GroupError::StudentNotGrouped(student))?;

        // The membership may vanish between the two reads.
        self.store
            .get_group(group_id)
            .await?
            .ok_or(GroupError::StudentNotGrouped(student))
    }

    pub async fn delete_all_groups(&self) -> Result<u64, GroupError> {
        let removed = self.store.delete_all_groups().await?;
        info!("Deleted all peer groups ({} removed)", removed);
        Ok(removed)
    }

    /// Remove one group and its memberships; `NotFound` when it does not exist.
    pub async fn delete_group(&self, group_id: GroupId) -> Result<(), GroupError> {
        if !self.store.delete_group(group_id).await? {
            return Err(GroupError::GroupNotFound(group_id));
        }
        info!("Deleted peer group {}", group_id);
        Ok(())
    }

    /// Remove only `student`'s membership. The group itself is kept.
    pub async fn leave_group(&self, student: StudentId) -> Result<MembershipRemoval, GroupError> {
        let removal = self
            .store
            .remove_member(student)
            .await?
            .ok_or(GroupError::StudentNotGrouped(student))?;

        info!(
            student = %student,
            group = %removal.group_id,
            remaining = removal.remaining_members,
            "Student left peer group"
        );
        if removal.leader_id.is_none() {
            warn!("Peer group {} has no members left", removal.group_id);
        }
        Ok(removal)
    }

    pub async fn health_check(&self) -> Result<(), GroupError> {
        Ok(self.store.health_check().await?)
    }
}

/// One "you've been grouped" message per member of every new group.
fn assignment_notifications(groups: &[NewGroup]) -> Vec<Notification> {
    groups
        .iter()
        .flat_map(|group| {
            let leader_name = group.leader().fullname.clone();
            let member_count = group.members.len().to_string();
            group.members.iter().map(move |member| Notification {
                to: member.email.clone(),
                template: GROUP_ASSIGNED.to_string(),
                variables: HashMap::from([
                    ("fullname".to_string(), member.fullname.clone()),
                    ("group_name".to_string(), group.name.clone()),
                    ("leader_name".to_string(), leader_name.clone()),
                    ("member_count".to_string(), member_count.clone()),
                ]),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::memory::MemoryStore;
    use crate::groups::types::PoolStatus;
    use crate::notify::ChannelNotifier;
    use crate::testing::seed_course;

    fn service(store: Arc<MemoryStore>) -> PeerGroupService {
        let (notifier, _rx) = ChannelNotifier::new();
        PeerGroupService::new(store.clone(), store, Arc::new(notifier), GroupingSettings::default())
    }

    #[tokio::test]
    async fn rejects_group_size_below_two() {
        let store = Arc::new(MemoryStore::new());
        let err = service(store).form_groups(None, Some(1)).await.unwrap_err();
        assert!(matches!(err, GroupError::InvalidGroupSize(1)));
    }

    #[tokio::test]
    async fn uses_the_configured_default_size() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, CourseId(1), 1..7).await;

        let (notifier, _rx) = ChannelNotifier::new();
        let settings = GroupingSettings {
            default_group_size: GroupSize::new(3).unwrap(),
            ..Default::default()
        };
        let service = PeerGroupService::new(store.clone(), store.clone(), Arc::new(notifier), settings);

        let result = service.form_groups(None, None).await.unwrap();
        assert_eq!(result.group_size, 3);
        assert_eq!(result.groups.len(), 2);
    }

    #[tokio::test]
    async fn empty_pool_is_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        let result = service(store).form_groups(Some(CourseId(5)), None).await.unwrap();
        assert!(result.groups.is_empty());
        assert_eq!(result.outcome_for(CourseId(5)).unwrap().status, PoolStatus::InsufficientPool);
    }

    #[tokio::test]
    async fn listing_limit_is_capped() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, CourseId(1), 1..13).await;
        let (notifier, _rx) = ChannelNotifier::new();
        let settings = GroupingSettings {
            max_list_limit: 2,
            ..Default::default()
        };
        let service = PeerGroupService::new(store.clone(), store, Arc::new(notifier), settings);
        service.form_groups(None, None).await.unwrap();

        let groups = service
            .get_all_groups(GroupFilter {
                limit: Some(50),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(groups.len(), 2);

        let all = service.get_all_groups(GroupFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn negative_list_cap_yields_an_empty_page() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, CourseId(1), 1..9).await;
        let (notifier, _rx) = ChannelNotifier::new();
        let settings = GroupingSettings {
            max_list_limit: -1,
            ..Default::default()
        };
        let service = PeerGroupService::new(store.clone(), store, Arc::new(notifier), settings);
        service.form_groups(None, None).await.unwrap();

        let groups = service
            .get_all_groups(GroupFilter {
                limit: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn eligible_students_shrink_after_a_run() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, CourseId(1), 1..7).await;
        let service = service(store);
        assert_eq!(service.eligible_students(None).await.unwrap().len(), 6);

        service.form_groups(None, Some(4)).await.unwrap();
        let left: Vec<StudentId> = service
            .eligible_students(Some(CourseId(1)))
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(left.len(), 2);
    }

    #[tokio::test]
    async fn deleting_a_missing_group_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = service(store).delete_group(GroupId(42)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn leaving_without_a_group_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = service(store).leave_group(StudentId(1)).await.unwrap_err();
        assert!(matches!(err, GroupError::StudentNotGrouped(StudentId(1))));
    }

    #[test]
    fn notifications_cover_every_member() {
        let group = NewGroup {
            name: "Smart-Hub".to_string(),
            course_id: CourseId(1),
            members: (1..=4)
                .map(|id| crate::groups::EligibleStudent {
                    id: StudentId(id),
                    fullname: format!("Student {}", id),
                    email: format!("s{}@example.com", id),
                    course_id: CourseId(1),
                })
                .collect(),
        };
        let notes = assignment_notifications(&[group]);
        assert_eq!(notes.len(), 4);
        assert!(notes.iter().all(|n| n.variables["leader_name"] == "Student 1"));
        assert!(notes.iter().all(|n| n.variables["member_count"] == "4"));
        assert_eq!(notes[2].to, "s3@example.com");
    }
}
