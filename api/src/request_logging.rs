use crate::auth::TENANT_HEADER;
use poem::{http::StatusCode, Endpoint, IntoResponse, Middleware, Request, Response};
use std::time::Instant;

/// Logs every request with its tenant, status and duration. Query bodies are
/// not logged here; the data layer logs the compiled SQL at debug level.
pub struct RequestLogging;

impl<E: Endpoint> Middleware<E> for RequestLogging {
    type Output = RequestLoggingEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        RequestLoggingEndpoint { inner: ep }
    }
}

pub struct RequestLoggingEndpoint<E> {
    inner: E,
}

fn log_request(method: &str, path: &str, tenant_id: &str, status: StatusCode, duration_ms: u128) {
    if status.is_server_error() {
        tracing::error!(method = %method, path = %path, tenant_id = %tenant_id, status = %status.as_u16(), duration_ms = %duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(method = %method, path = %path, tenant_id = %tenant_id, status = %status.as_u16(), duration_ms = %duration_ms, "request rejected");
    } else {
        tracing::info!(method = %method, path = %path, tenant_id = %tenant_id, status = %status.as_u16(), duration_ms = %duration_ms, "request completed");
    }
}

impl<E: Endpoint> Endpoint for RequestLoggingEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> poem::Result<Self::Output> {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let tenant_id = req
            .headers()
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        let result = self.inner.call(req).await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(resp) => {
                let resp = resp.into_response();
                log_request(&method, &path, &tenant_id, resp.status(), duration_ms);
                Ok(resp)
            }
            Err(err) => {
                log_request(&method, &path, &tenant_id, err.status(), duration_ms);
                Err(err)
            }
        }
    }
}
