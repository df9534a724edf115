//! Streaming response relay
//!
//! Forwards upstream body chunks to the caller as they arrive, without
//! buffering or re-framing. An upstream read error ends the relay with one
//! final `STREAMING_ERROR` error body. Dropping the relay drops the upstream
//! stream, which releases the upstream connection.

use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{error, info};

use crate::error::ErrorResponse;
use crate::orchestrator::RequestContext;
use crate::routes::metrics::record_stream_chunk;

/// Error body chunk emitted when the upstream fails mid-stream
pub fn streaming_error_chunk(message: &str) -> Bytes {
    let body = ErrorResponse::new(
        format!("Streaming error: {message}"),
        "STREAMING_ERROR",
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
    );
    // Serializing a struct of strings cannot fail.
    Bytes::from(serde_json::to_vec(&body).unwrap_or_default())
}

/// Relay upstream chunks in order
///
/// Items are always `Ok`; upstream errors become a final error chunk so the
/// response body closes cleanly.
pub fn relay<S, E>(
    upstream: S,
    ctx: RequestContext,
) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut upstream = upstream;
        let mut chunks: usize = 0;
        ctx.log_stream_started();

        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    chunks += 1;
                    record_stream_chunk(&ctx.provider);
                    yield Ok(chunk);
                }
                Err(e) => {
                    error!(
                        request_id = %ctx.request_id,
                        provider = %ctx.provider,
                        chunks,
                        error = %e,
                        "Upstream stream failed"
                    );
                    yield Ok(streaming_error_chunk(&e.to_string()));
                    break;
                }
            }
        }

        ctx.log_stream_ended(chunks);
        info!(request_id = %ctx.request_id, chunks, "Relay finished");
    }
}
