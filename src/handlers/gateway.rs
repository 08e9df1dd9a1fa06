use std::io;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use hyper::http::HeaderMap;
use hyper::{Method, Request, Response, StatusCode, body::Incoming, header};

use tracing::{debug, error};

use crate::common::{BoxedBody, empty, full};
use crate::drive::{Drive, DriveResolver};
use crate::handlers::Handler;
use crate::handlers::compose::{compose, version_tag};
use crate::handlers::range::plan;
use crate::handlers::resolve::{ResolvedEntry, resolve};

/// Serves drives over `METHOD /{driveKey}/{*path}`.
///
/// The drive store is an injected capability; this handler only borrows
/// one handle per request and walks it through resolution, range
/// planning and composition. Every failure path terminates in a
/// well-formed response, never in a connection-level error.
pub struct DriveGatewayHandler {
    store: Arc<dyn DriveResolver>,
}

impl DriveGatewayHandler {
    pub fn new(store: Arc<dyn DriveResolver>) -> Self {
        DriveGatewayHandler { store }
    }

    async fn serve(
        &self,
        drive: &dyn Drive,
        path: &str,
        method: &Method,
        headers: &HeaderMap,
    ) -> io::Result<Response<BoxedBody>> {
        let entry = resolve(drive, path).await;
        let range = match &entry {
            ResolvedEntry::File { size, .. } => plan(headers.get(header::RANGE), *size),
            _ => None,
        };
        compose(drive, &entry, range, method).await
    }
}

#[async_trait]
impl Handler for DriveGatewayHandler {
    async fn handle(&self, req: Request<Incoming>) -> Result<Response<BoxedBody>> {
        // uri().path() already excludes any query string.
        let (key, path) = split_route(req.uri().path());
        let method = req.method().clone();

        if key.is_empty() {
            return Ok(unknown_drive(&method));
        }

        let drive = match self.store.resolve_drive(key).await {
            Ok(Some(drive)) => drive,
            Ok(None) => {
                debug!(key, "unknown drive key");
                return Ok(unknown_drive(&method));
            }
            Err(err) => {
                // The store faulted before any handle was obtained, so no
                // version tag is available.
                error!(key, error = %err, "drive store fault");
                return Ok(plain_404(err.to_string(), None, &method));
            }
        };

        match self.serve(drive.as_ref(), path, &method, req.headers()).await {
            Ok(response) => {
                debug!(key, path, status = %response.status(), "request served");
                Ok(response)
            }
            Err(err) => {
                error!(key, path, error = %err, "storage fault while serving");
                Ok(plain_404(
                    err.to_string(),
                    Some(drive.version()),
                    &method,
                ))
            }
        }
    }
}

fn split_route(raw_path: &str) -> (&str, &str) {
    let trimmed = raw_path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((key, rest)) => (key, rest),
        None => (trimmed, ""),
    }
}

fn unknown_drive(method: &Method) -> Response<BoxedBody> {
    plain_404("Unknown drive".to_string(), None, method)
}

/// Plain-text 404, version-tagged only when a drive handle was obtained
/// before the failure.
fn plain_404(reason: String, version: Option<u64>, method: &Method) -> Response<BoxedBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_LENGTH, reason.len());
    if let Some(version) = version {
        builder = builder.header(header::ETAG, version_tag(version));
    }
    let body = if *method == Method::GET {
        full(reason)
    } else {
        empty()
    };
    builder.body(body).expect("valid 404 response")
}
