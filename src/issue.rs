// src/issue.rs

use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::issue_db::{IssueFilter, SortKey, SortOrder};
use crate::models::issue::{CreateIssueRequest, IssueListResponse, UpdateIssueRequest};
use crate::models::ErrorResponse;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Query parameters accepted by the listing endpoint.
#[derive(Debug, Deserialize)]
pub struct IssueQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

/// GET /health
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse { status: "ok" })
}

/// GET /issues
/// List issues with search, filters, sorting and pagination.
pub async fn list_issues(
    data: web::Data<AppState>,
    query: web::Query<IssueQuery>,
) -> impl Responder {
    let sort_by = query.sort_by.as_deref().unwrap_or("updatedAt");
    let sort_key = match SortKey::parse(sort_by) {
        Some(key) => key,
        None => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("Invalid sortBy field: {}", sort_by),
            })
        }
    };
    let sort_order = SortOrder::parse(query.sort_order.as_deref().unwrap_or("desc"));

    // Out-of-range values are clamped rather than handed to the store.
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(10).clamp(1, 100);

    let filter = IssueFilter {
        search: non_empty(&query.search),
        status: non_empty(&query.status),
        priority: non_empty(&query.priority),
        assignee: non_empty(&query.assignee),
    };

    match data.db.list_issues(&filter, sort_key, sort_order, page, page_size) {
        Ok((issues, total)) => HttpResponse::Ok().json(IssueListResponse {
            data: issues,
            total,
            page,
            page_size,
            total_pages: (total + page_size - 1) / page_size,
        }),
        Err(e) => {
            error!("Error listing issues: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Error listing issues".to_string(),
            })
        }
    }
}

/// GET /issues/{issue_id}
pub async fn get_issue(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let issue_id = path.into_inner();
    match data.db.get_issue(&issue_id) {
        Ok(Some(issue)) => HttpResponse::Ok().json(issue),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Issue not found".to_string(),
        }),
        Err(e) => {
            error!("Error fetching issue {}: {}", issue_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Error fetching issue".to_string(),
            })
        }
    }
}

/// POST /issues
/// Create an issue; only `title` is required, the rest takes defaults.
pub async fn create_issue(
    data: web::Data<AppState>,
    payload: web::Json<CreateIssueRequest>,
) -> impl Responder {
    let title = match payload.title.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Title is required".to_string(),
            })
        }
    };

    match data.db.create_issue(
        title,
        payload.description.as_deref(),
        payload.status.as_deref(),
        payload.priority.as_deref(),
        payload.assignee.as_deref(),
    ) {
        Ok(issue) => {
            info!("Issue created: {}", issue.id);
            HttpResponse::Created().json(issue)
        }
        Err(e) => {
            error!("Error inserting issue: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Error inserting issue".to_string(),
            })
        }
    }
}

/// PUT /issues/{issue_id}
/// Partial update: any subset of the editable fields may be sent. An empty
/// body is rejected; a non-empty body with no recognized fields still
/// refreshes `updatedAt`.
pub async fn update_issue(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<serde_json::Value>,
) -> impl Responder {
    let issue_id = path.into_inner();

    let body = match payload.into_inner() {
        serde_json::Value::Object(map) if !map.is_empty() => serde_json::Value::Object(map),
        _ => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "No data provided".to_string(),
            })
        }
    };

    let req: UpdateIssueRequest = match serde_json::from_value(body) {
        Ok(req) => req,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("Invalid body: {}", e),
            })
        }
    };

    match data.db.update_issue(&issue_id, &req) {
        Ok(Some(issue)) => HttpResponse::Ok().json(issue),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Issue not found".to_string(),
        }),
        Err(e) => {
            error!("Error updating issue {}: {}", issue_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Error updating issue".to_string(),
            })
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/issues")
            .route("", web::get().to(list_issues))
            .route("", web::post().to(create_issue))
            .route("/{issue_id}", web::get().to(get_issue))
            .route("/{issue_id}", web::put().to(update_issue)),
    );
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
