//! Request cloner.
//!
//! A `reqwest::Request` is consumed by `execute`, so every resend starts from
//! an independent copy of the original request.

use reqwest::{Body, Request};

use super::errors::SendError;

/// Copy method, URL, version, timeout and headers, and re-buffer the body.
///
/// Fails with [`SendError::Clone`] when the body is a stream that cannot be
/// read back into memory.
pub fn clone_request(request: &Request) -> Result<Request, SendError> {
    let mut clone = Request::new(request.method().clone(), request.url().clone());
    *clone.headers_mut() = request.headers().clone();
    *clone.version_mut() = request.version();
    *clone.timeout_mut() = request.timeout().copied();

    if let Some(body) = request.body() {
        let bytes = body.as_bytes().ok_or_else(|| {
            SendError::Clone(format!(
                "{} {} has a streaming body that cannot be buffered",
                request.method(),
                request.url()
            ))
        })?;
        *clone.body_mut() = Some(Body::from(bytes.to_vec()));
    }

    Ok(clone)
}
