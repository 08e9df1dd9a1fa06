use std::io;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use http_body_util::{BodyExt, StreamBody};
use hyper::{Method, Response, StatusCode, body::Frame, header};
use mime::Mime;
use tokio::io::AsyncRead;

use crate::common::{BoxedBody, empty, full};
use crate::drive::{DirEntry, Drive};
use crate::handlers::range::ByteRange;
use crate::handlers::resolve::ResolvedEntry;

// Time-to-live advertised in the discovery descriptor, in seconds.
const DISCOVERY_TTL_SECS: u64 = 3600;

/// The drive-version cache tag: an ETag-style quoted revision number.
/// Caches key on this; it changes exactly when drive content changes.
pub fn version_tag(version: u64) -> String {
    format!("\"{}\"", version)
}

/// Builds the full response for a resolved entry: status, headers in a
/// fixed order, and a body source. Non-GET methods get identical headers
/// with an empty body, so HEAD is answered without transferring content.
pub async fn compose(
    drive: &dyn Drive,
    entry: &ResolvedEntry,
    range: Option<ByteRange>,
    method: &Method,
) -> io::Result<Response<BoxedBody>> {
    let send_body = *method == Method::GET;
    let tag = version_tag(drive.version());

    match entry {
        ResolvedEntry::Discovery => {
            let descriptor = format!("dat://{}\nttl={}", drive.key(), DISCOVERY_TTL_SECS);
            let builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .header(header::CONTENT_LENGTH, descriptor.len())
                .header(header::ETAG, tag);
            let body = if send_body { full(descriptor) } else { empty() };
            Ok(builder.body(body).expect("valid discovery response"))
        }

        ResolvedEntry::Unresolved { reason } => {
            let builder = Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .header(header::CONTENT_LENGTH, reason.len())
                .header(header::ETAG, tag);
            let body = if send_body {
                full(reason.clone())
            } else {
                empty()
            };
            Ok(builder.body(body).expect("valid not-found response"))
        }

        ResolvedEntry::Directory { path, entries } => {
            let markup = render_listing(drive.key(), path, entries);
            let builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/html")
                .header(header::CONTENT_LENGTH, markup.len())
                .header(header::ETAG, tag);
            let body = if send_body { full(markup) } else { empty() };
            Ok(builder.body(body).expect("valid listing response"))
        }

        ResolvedEntry::File { path, size } => {
            let content_type: Mime = mime_guess::from_path(path).first_or_octet_stream();

            match range {
                Some(range) => {
                    let builder = Response::builder()
                        .status(StatusCode::PARTIAL_CONTENT)
                        .header(header::CONTENT_TYPE, content_type.to_string())
                        .header(header::CONTENT_RANGE, range.content_range())
                        .header(header::CONTENT_LENGTH, range.len())
                        .header(header::ACCEPT_RANGES, "bytes")
                        .header(header::ETAG, tag);
                    let body = if send_body {
                        let reader = drive
                            .read_stream(path, range.start, Some(range.end))
                            .await?;
                        BodyExt::boxed(stream_body(reader))
                    } else {
                        empty()
                    };
                    Ok(builder.body(body).expect("valid partial response"))
                }
                None => {
                    let builder = Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, content_type.to_string())
                        .header(header::CONTENT_LENGTH, *size)
                        .header(header::ACCEPT_RANGES, "bytes")
                        .header(header::ETAG, tag);
                    let body = if send_body {
                        let reader = drive.read_stream(path, 0, None).await?;
                        BodyExt::boxed(stream_body(reader))
                    } else {
                        empty()
                    };
                    Ok(builder.body(body).expect("valid file response"))
                }
            }
        }
    }
}

// Helper to wrap an AsyncRead source as a hyper StreamBody
fn stream_body<R>(reader: R) -> StreamBody<impl Stream<Item = Result<Frame<Bytes>, io::Error>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let stream = tokio_util::io::ReaderStream::new(reader);
    StreamBody::new(stream.map(|res| res.map(Frame::data)))
}

/// Listing markup: title with the drive key and path, an "Index of"
/// heading, a parent link, then one link per entry in resolver order
/// (never re-sorted), directories suffixed with `/`.
fn render_listing(key: &str, path: &str, entries: &[DirEntry]) -> String {
    let shown_path = if path.is_empty() { "/" } else { path };
    let mut markup = String::from("<!DOCTYPE html>\n");
    markup.push_str(&format!("<title>{}/{}</title>\n", key, escape_html(path)));
    markup.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n");
    markup.push_str(&format!("<h1>Index of {}</h1>\n", escape_html(shown_path)));
    markup.push_str("<ul>\n");
    markup.push_str("  <li><a href=\"../\">../</a></li>\n");
    for entry in entries {
        let suffix = if entry.stat.is_directory() { "/" } else { "" };
        let name = escape_html(&entry.name);
        markup.push_str(&format!(
            "  <li><a href=\"{}{}\">./{}{}</a></li>\n",
            name, suffix, name, suffix
        ));
    }
    markup.push_str("</ul>\n");
    markup
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
