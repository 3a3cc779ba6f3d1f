//! Binary export fetch with ETag-based conditional requests.

use bytes::Bytes;
use tracing::debug;
use viewer_core::{ContentHash, ExportedMesh, Viewer};

use crate::error::BridgeError;

/// Reply to an export fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportResponse {
    Ok(ExportBody),
    /// The client's cached copy is current; no body.
    NotModified { etag: String },
}

/// Headers and payload of a successful export fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBody {
    pub content_type: &'static str,
    pub content_length: usize,
    pub content_disposition: String,
    pub etag: String,
    pub body: Bytes,
}

impl From<ExportedMesh> for ExportBody {
    fn from(mesh: ExportedMesh) -> Self {
        Self {
            content_type: mesh.mimetype(),
            content_length: mesh.payload.len(),
            content_disposition: format!("attachment; filename=\"{}\"", mesh.filename()),
            etag: etag_for(mesh.content_hash),
            body: mesh.payload,
        }
    }
}

impl ExportResponse {
    pub fn etag(&self) -> &str {
        match self {
            ExportResponse::Ok(body) => &body.etag,
            ExportResponse::NotModified { etag } => etag,
        }
    }
}

/// Strong ETag for a content hash: the quoted hex digest.
pub fn etag_for(hash: ContentHash) -> String {
    format!("\"{hash}\"")
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// Accepts `*`, comma-separated lists and weak validators.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

/// Fetch the binary export of `name`, honouring `If-None-Match`.
pub fn fetch_export(
    viewer: &Viewer,
    name: &str,
    if_none_match: Option<&str>,
) -> Result<ExportResponse, BridgeError> {
    let mesh = viewer.export(name)?;
    let etag = etag_for(mesh.content_hash);

    if if_none_match.is_some_and(|header| etag_matches(header, &etag)) {
        debug!(%name, %etag, "export not modified");
        return Ok(ExportResponse::NotModified { etag });
    }
    Ok(ExportResponse::Ok(mesh.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_quoted_hash() {
        assert_eq!(etag_for(ContentHash(1)), "\"0000000000000001\"");
    }

    #[test]
    fn if_none_match_forms() {
        let etag = "\"00000000000000ff\"";
        assert!(etag_matches(etag, etag));
        assert!(etag_matches("*", etag));
        assert!(etag_matches("\"a\", W/\"00000000000000ff\"", etag));
        assert!(!etag_matches("\"00000000000000fe\"", etag));
    }
}
