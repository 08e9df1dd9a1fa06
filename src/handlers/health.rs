// Internal imports
use crate::common::{BoxedBody, empty, full};
use crate::handlers::Handler;

// HTTP and body handling
use hyper::{Method, Request, Response, StatusCode, body::Incoming, header};

// Logging & Error Handling
use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct HealthCheckHandler {}

impl HealthCheckHandler {
    pub fn new() -> Self {
        HealthCheckHandler {}
    }
}

#[async_trait]
impl Handler for HealthCheckHandler {
    async fn handle(&self, req: Request<Incoming>) -> Result<Response<BoxedBody>> {
        if *req.method() != Method::GET {
            tracing::debug!("Health check received non-GET request: {}", req.method());
            let response = Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header(header::ALLOW, "GET")
                .body(empty())
                .context("Failed to build 405 response")?;
            return Ok(response);
        }

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(full("lantern is healthy"))
            .context("Failed to build 200 response")?;
        Ok(response)
    }
}
