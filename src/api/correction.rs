use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::Deserialize;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        correction::{CorrectionRequest, RequestStatus},
        page::{CorrectionPage, PageRequest},
    },
    service::correction::{self as workflow, CorrectionSubmission},
    store::correction::MySqlCorrectionStore,
    utils::payroll_cache::PayrollCache,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct MineQuery {
    /// `pending`, `approved` or `rejected`
    #[param(value_type = Option<String>)]
    pub status: Option<RequestStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PendingQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviewReq {
    #[schema(example = "Confirmed with the badge log")]
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/corrections",
    request_body = CorrectionSubmission,
    responses(
        (status = 201, description = "Request created as pending", body = CorrectionRequest),
        (status = 400, description = "Missing reason or proposed times that don't fit the type"),
        (status = 403, description = "User has no employee profile"),
        (status = 404, description = "Unknown shift")
    ),
    tag = "Corrections",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, store, payload), fields(user_id = auth.user_id))]
pub async fn submit_correction(
    auth: AuthUser,
    store: web::Data<MySqlCorrectionStore>,
    payload: web::Json<CorrectionSubmission>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.employee_id_required()?;
    let now = Local::now().naive_local();

    let created = workflow::submit(store.get_ref(), employee_id, payload.into_inner(), now).await?;

    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/corrections/mine",
    params(MineQuery),
    responses((status = 200, description = "Caller's requests, newest first", body = CorrectionPage)),
    tag = "Corrections",
    security(("bearer_auth" = []))
)]
pub async fn list_my_corrections(
    auth: AuthUser,
    store: web::Data<MySqlCorrectionStore>,
    query: web::Query<MineQuery>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.employee_id_required()?;
    let page = PageRequest::new(query.page, query.per_page);

    let list = workflow::list_mine(store.get_ref(), employee_id, query.status, page).await?;

    Ok(HttpResponse::Ok().json(list))
}

#[utoipa::path(
    get,
    path = "/api/corrections/pending",
    params(PendingQuery),
    responses(
        (status = 200, description = "Pending requests, newest first", body = CorrectionPage),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Corrections",
    security(("bearer_auth" = []))
)]
pub async fn list_pending_corrections(
    auth: AuthUser,
    store: web::Data<MySqlCorrectionStore>,
    query: web::Query<PendingQuery>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let page = PageRequest::new(query.page, query.per_page);

    let list = workflow::list_pending(store.get_ref(), page).await?;

    Ok(HttpResponse::Ok().json(list))
}

#[utoipa::path(
    get,
    path = "/api/corrections/{id}",
    params(("id", Path, description = "Correction request ID")),
    responses(
        (status = 200, description = "The request", body = CorrectionRequest),
        (status = 403, description = "Another employee's request"),
        (status = 404, description = "No such request")
    ),
    tag = "Corrections",
    security(("bearer_auth" = []))
)]
pub async fn get_correction(
    auth: AuthUser,
    store: web::Data<MySqlCorrectionStore>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let request = workflow::get(store.get_ref(), path.into_inner()).await?;

    if auth.is_staff() && auth.employee_id != Some(request.employee_id) {
        return Err(AppError::Forbidden("Staff can only view their own requests".into()));
    }

    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/corrections/{id}/approve",
    params(("id", Path, description = "Correction request ID")),
    request_body = ReviewReq,
    responses(
        (status = 200, description = "Approved; attendance updated in the same transaction", body = CorrectionRequest),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request is no longer pending")
    ),
    tag = "Corrections",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, store, cache, body), fields(reviewer_id = auth.user_id))]
pub async fn approve_correction(
    auth: AuthUser,
    store: web::Data<MySqlCorrectionStore>,
    cache: web::Data<PayrollCache>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewReq>>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let notes = body.and_then(|b| b.into_inner().notes);
    let now = Local::now().naive_local();

    let approved = workflow::approve(store.get_ref(), path.into_inner(), auth.user_id, notes, now).await?;
    cache.invalidate_all();

    Ok(HttpResponse::Ok().json(approved))
}

#[utoipa::path(
    put,
    path = "/api/corrections/{id}/reject",
    params(("id", Path, description = "Correction request ID")),
    request_body = ReviewReq,
    responses(
        (status = 200, description = "Rejected; attendance untouched", body = CorrectionRequest),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request is no longer pending")
    ),
    tag = "Corrections",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, store, body), fields(reviewer_id = auth.user_id))]
pub async fn reject_correction(
    auth: AuthUser,
    store: web::Data<MySqlCorrectionStore>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewReq>>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let notes = body.and_then(|b| b.into_inner().notes);
    let now = Local::now().naive_local();

    let rejected = workflow::reject(store.get_ref(), path.into_inner(), auth.user_id, notes, now).await?;

    Ok(HttpResponse::Ok().json(rejected))
}
