//! Peer groups: formation policy, storage seams and lifecycle service.

mod error;
pub mod ids;
pub mod memory;
pub mod names;
pub mod policy;
pub mod postgres;
pub mod service;
pub mod store;
pub mod types;

pub use error::{GroupError, StoreError};
pub use ids::{CourseId, GroupId, StudentId};
pub use memory::MemoryStore;
pub use policy::{GroupSize, DEFAULT_GROUP_SIZE};
pub use postgres::PgGroupStore;
pub use service::{GroupingSettings, PeerGroupService};
pub use store::{EnrollmentDirectory, FormationRun, GroupStore, Planner};
pub use types::{
    CourseOutcome, CreatedGroup, EligibleStudent, GroupFilter, GroupFormationResult, GroupView,
    MemberView, MembershipRemoval, PoolStatus,
};
