use poem::{error::ResponseError, http::StatusCode, FromRequest, Request, RequestBody};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub const TENANT_HEADER: &str = "X-Tenant-Id";
pub const ROLE_HEADER: &str = "X-Role";

static TENANT_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn tenant_id_regex() -> &'static Regex {
    TENANT_ID_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,127}$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Member,
    Admin,
}

/// Tenant resolved by the upstream gateway. The gateway authenticates the
/// caller; this service only trusts and validates what it forwards.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    pub role: Role,
}

/// A [`TenantContext`] whose role passed the admin gate.
#[derive(Debug, Clone)]
pub struct AdminContext(pub TenantContext);

#[derive(Debug)]
pub enum AuthError {
    MissingHeader(String),
    InvalidFormat(String),
    Forbidden(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::MissingHeader(h) => write!(f, "Missing required header: {}", h),
            AuthError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            AuthError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl ResponseError for AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

pub fn parse_tenant_id(raw: &str) -> Result<String, AuthError> {
    let tenant_id = raw.trim();
    if !tenant_id_regex().is_match(tenant_id) {
        return Err(AuthError::InvalidFormat(format!(
            "{} must be 1-128 characters of letters, digits, '.', '_' or '-'",
            TENANT_HEADER
        )));
    }
    Ok(tenant_id.to_string())
}

pub fn parse_role(raw: Option<&str>) -> Role {
    match raw.map(str::trim) {
        Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
        _ => Role::Member,
    }
}

impl FromRequest<'_> for TenantContext {
    async fn from_request(req: &Request, _body: &mut RequestBody) -> poem::Result<Self> {
        let headers = req.headers();

        let raw_tenant = headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::MissingHeader(TENANT_HEADER.to_string()))?;
        let tenant_id = parse_tenant_id(raw_tenant)?;
        let role = parse_role(headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok()));

        Ok(TenantContext { tenant_id, role })
    }
}

impl FromRequest<'_> for AdminContext {
    async fn from_request(req: &Request, body: &mut RequestBody) -> poem::Result<Self> {
        let context = TenantContext::from_request(req, body).await?;
        if context.role != Role::Admin {
            tracing::warn!(
                tenant_id = %context.tenant_id,
                path = %req.uri().path(),
                "Non-admin caller rejected from admin endpoint"
            );
            return Err(AuthError::Forbidden("admin role required".to_string()).into());
        }
        Ok(AdminContext(context))
    }
}
