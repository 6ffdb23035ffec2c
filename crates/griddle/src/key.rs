//! Batch keys and how they are derived from an inbound request.

use std::fmt;
use crate::error::{GriddleError, Result};

/// Requests are only ever batched together when their keys compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    /// Routine entry point the request targets, e.g. `rotate_180`.
    pub endpoint_name: String,

    /// Whether the caller wants a JSON rendering of the result.
    pub wants_json: bool,
}

impl BatchKey {
    pub fn new(endpoint_name: impl Into<String>, wants_json: bool) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            wants_json,
        }
    }

    /// Builds the key for an HTTP request.
    ///
    /// `json_output_supported` reflects whether the service declares a JSON
    /// output at all; without it every request is keyed as non-JSON.
    pub fn from_request(path: &str, accept: Option<&str>, json_output_supported: bool) -> Result<Self> {
        let format = ResponseFormat::from_accept(accept)?;
        Ok(Self {
            endpoint_name: endpoint_name_from_path(path),
            wants_json: json_output_supported && format == ResponseFormat::Json,
        })
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = if self.wants_json { "json" } else { "multipart" };
        write!(f, "{}[{}]", self.endpoint_name, format)
    }
}

/// Maps a request path onto an entry point name.
///
/// Leading and trailing separators are dropped and inner ones become
/// underscores: `/rotate_180` is `rotate_180`, `/image/rotate/` is `image_rotate`.
pub fn endpoint_name_from_path(path: &str) -> String {
    path.trim_matches('/').replace('/', "_")
}

/// Rendering requested through the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Multipart,
    Json,
}

impl ResponseFormat {
    pub const MULTIPART: &'static str = "multipart/form-data";
    pub const JSON: &'static str = "application/json";

    /// A missing header means multipart; anything besides the two supported
    /// media types is rejected.
    pub fn from_accept(accept: Option<&str>) -> Result<Self> {
        match accept {
            None | Some(Self::MULTIPART) => Ok(ResponseFormat::Multipart),
            Some(Self::JSON) => Ok(ResponseFormat::Json),
            Some(other) => Err(GriddleError::InvalidAcceptHeader(other.to_string())),
        }
    }

    /// The media type to answer with.
    pub fn mime(&self) -> &'static str {
        match self {
            ResponseFormat::Multipart => Self::MULTIPART,
            ResponseFormat::Json => Self::JSON,
        }
    }
}
