// handlers/protected/peer_group.rs - student-facing peer group routes

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::groups::{CourseId, GroupFilter, GroupId, GroupView, MembershipRemoval};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, PageInfo};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub course_id: Option<CourseId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/peer-groups - every group with leader and roster
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<GroupView>> {
    let filter = state.groups.list_filter(GroupFilter {
        course_id: query.course_id,
        limit: query.limit,
        offset: query.offset,
    });
    let groups = state.groups.get_all_groups(filter.clone()).await?;
    let page = PageInfo::for_filter(&filter, groups.len());
    Ok(ApiResponse::success(groups).with_page(page))
}

/// GET /api/peer-groups/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<GroupView> {
    let group = state.groups.get_group_by_id(GroupId(id)).await?;
    Ok(ApiResponse::success(group))
}

/// GET /api/peer-groups/me - the caller's group
pub async fn mine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<GroupView> {
    let group = state.groups.get_group_for_student(user.user_id).await?;
    Ok(ApiResponse::success(group))
}

/// DELETE /api/peer-groups/me - leave the caller's group; the group stays
pub async fn leave(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<MembershipRemoval> {
    let removal = state.groups.leave_group(user.user_id).await?;
    Ok(ApiResponse::success(removal))
}
