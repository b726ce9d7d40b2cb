// handlers/elevated/peer_group.rs - administrative peer group routes

use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::groups::{CourseId, GroupFormationResult, GroupId};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormRequest {
    pub course_id: Option<CourseId>,
    pub group_size: Option<usize>,
}

impl FormRequest {
    /// An empty body means "all courses, default size".
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
    }
}

/// POST /api/root/peer-groups - run grouping; 201 when groups were created
pub async fn form(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<GroupFormationResult> {
    let request = FormRequest::parse(&body)?;
    tracing::info!(
        admin = %admin.user_id,
        course = ?request.course_id,
        size = ?request.group_size,
        "Grouping run requested"
    );

    let result = state.groups.form_groups(request.course_id, request.group_size).await?;
    if result.groups.is_empty() {
        Ok(ApiResponse::success(result))
    } else {
        Ok(ApiResponse::created(result))
    }
}

/// DELETE /api/root/peer-groups - remove every group
pub async fn delete_all(State(state): State<AppState>) -> ApiResult<Value> {
    let deleted = state.groups.delete_all_groups().await?;
    Ok(ApiResponse::success(json!({ "deleted": deleted })))
}

/// DELETE /api/root/peer-groups/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    state.groups.delete_group(GroupId(id)).await?;
    Ok(ApiResponse::success(json!({ "deleted": id })))
}
