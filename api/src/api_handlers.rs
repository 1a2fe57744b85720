use crate::auth::{AdminContext, TenantContext};
use crate::config::AppConfig;
use crate::database::{Database, FilteredPage, RawQueryResult};
use poem::{
    handler,
    http::StatusCode,
    web::{Data, Json, Path},
    IntoResponse, Response,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tenant_query::{
    all_resources, allowed_tables, fields_for, FieldDef, FilterGroup, QueryError, QuerySpec,
    Resource, SortSpec, TableAllowList,
};

// Common response wrapper
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_alternatives: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            valid_alternatives: None,
        }
    }

    pub fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
            error_kind: None,
            valid_alternatives: None,
        }
    }

    pub fn from_query_error(err: &QueryError) -> Self {
        Self {
            error_kind: Some(err.kind().to_string()),
            valid_alternatives: err.valid_alternatives().map(|v| v.to_vec()),
            ..Self::error(err.to_string())
        }
    }
}

/// Rejections are the caller's fault; timeouts and execution failures are not.
pub fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::QueryTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        QueryError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn respond<T: Serialize + Send>(result: Result<T, QueryError>) -> Response {
    match result {
        Ok(data) => Json(ApiResponse::success(data)).into_response(),
        Err(err) => (
            status_for(&err),
            Json(ApiResponse::<T>::from_query_error(&err)),
        )
            .into_response(),
    }
}

fn parse_resource(name: &str) -> Result<Resource, Response> {
    Resource::from_str(name).map_err(|_| {
        let body = ApiResponse::<()> {
            error_kind: Some("unknown_resource".to_string()),
            valid_alternatives: Some(all_resources().iter().map(|r| r.to_string()).collect()),
            ..ApiResponse::error(format!("Unknown resource '{}'", name))
        };
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    })
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

#[handler]
pub async fn health() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

#[handler]
pub async fn list_resource_fields(Path(resource): Path<String>) -> Response {
    match parse_resource(&resource) {
        Ok(resource) => respond::<&'static [FieldDef]>(Ok(fields_for(resource))),
        Err(response) => response,
    }
}

/// Where a filter tree is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    #[default]
    Database,
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub evaluate: Evaluation,
}

async fn run_filter(
    db: &Database,
    config: &AppConfig,
    resource: Resource,
    tenant_id: &str,
    req: FilterRequest,
) -> Result<FilteredPage, QueryError> {
    let filter = match req.filter {
        Some(value) => FilterGroup::from_json(value)?,
        None => FilterGroup::empty(),
    };
    let (sort, limits) = (req.sort.as_ref(), &config.query_limits);
    match req.evaluate {
        Evaluation::Database => {
            db.search_filtered(resource, tenant_id, &filter, sort, req.limit, req.offset, limits)
                .await
        }
        Evaluation::Memory => {
            db.search_in_memory(resource, tenant_id, &filter, sort, req.limit, req.offset, limits)
                .await
        }
    }
}

#[handler]
pub async fn filter_resource(
    db: Data<&Arc<Database>>,
    config: Data<&Arc<AppConfig>>,
    tenant: TenantContext,
    Path(resource): Path<String>,
    Json(req): Json<FilterRequest>,
) -> Response {
    let resource = match parse_resource(&resource) {
        Ok(resource) => resource,
        Err(response) => return response,
    };
    respond(run_filter(&db, &config, resource, &tenant.tenant_id, req).await)
}

#[handler]
pub async fn list_query_tables(_admin: AdminContext) -> Json<ApiResponse<&'static [TableAllowList]>> {
    Json(ApiResponse::success(allowed_tables()))
}

#[handler]
pub async fn run_query_builder(
    db: Data<&Arc<Database>>,
    config: Data<&Arc<AppConfig>>,
    AdminContext(admin): AdminContext,
    Json(spec): Json<QuerySpec>,
) -> Response {
    let result: Result<Vec<Map<String, Value>>, QueryError> = db
        .run_query_spec(
            &spec,
            &admin.tenant_id,
            &config.query_limits,
            &config.execution,
        )
        .await;
    respond(result)
}

#[derive(Debug, Deserialize)]
pub struct CustomSqlRequest {
    pub sql: String,
}

#[handler]
pub async fn run_custom_sql(
    db: Data<&Arc<Database>>,
    config: Data<&Arc<AppConfig>>,
    AdminContext(admin): AdminContext,
    Json(req): Json<CustomSqlRequest>,
) -> Response {
    tracing::info!(tenant_id = %admin.tenant_id, "Custom SQL requested");
    let result: Result<RawQueryResult, QueryError> = db
        .run_raw_sql(&req.sql, &config.raw_sql_guard, &config.execution)
        .await;
    respond(result)
}
