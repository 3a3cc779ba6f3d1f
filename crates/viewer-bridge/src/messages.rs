use serde::{Deserialize, Serialize};

use viewer_core::{SelectionResult, ShowEvent, ViewerError};
use viewer_types::{EntityProperties, TopoKind};

/// What a selection request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionAction {
    Select,
    Deselect,
}

/// Selection request from the browser.
///
/// Only `action` is always required. A select needs the other three fields;
/// a deselect ignores whatever they hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub action: SelectionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    /// `face`, `edge` or `vertex` (plural forms accepted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_type: Option<String>,
    /// Signed so negative picks can be reported as out of range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_index: Option<i64>,
}

impl SelectionRequest {
    pub fn select(object_name: &str, selection_type: &str, geometry_index: i64) -> Self {
        Self {
            action: SelectionAction::Select,
            object_name: Some(object_name.to_string()),
            selection_type: Some(selection_type.to_string()),
            geometry_index: Some(geometry_index),
        }
    }

    pub fn deselect() -> Self {
        Self {
            action: SelectionAction::Deselect,
            object_name: None,
            selection_type: None,
            geometry_index: None,
        }
    }
}

/// Just the action of a request, for bodies whose other fields are malformed.
#[derive(Debug, Deserialize)]
pub(crate) struct ActionOnly {
    pub action: SelectionAction,
}

/// Successful reply to a selection request.
///
/// A select fills every field; a deselect only echoes what it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_type: Option<TopoKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<EntityProperties>,
}

impl SelectionResponse {
    pub fn deselected(object_name: Option<String>) -> Self {
        Self {
            success: true,
            selection_type: None,
            geometry_index: None,
            object_name,
            properties: None,
        }
    }
}

impl From<SelectionResult> for SelectionResponse {
    fn from(result: SelectionResult) -> Self {
        Self {
            success: true,
            selection_type: Some(result.kind),
            geometry_index: Some(result.index as i64),
            object_name: Some(result.object_name),
            properties: Some(result.properties),
        }
    }
}

/// Typed error reply. `valid_range` is `[0, count)` for index errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub success: bool,
    pub error: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_range: Option<[usize; 2]>,
}

impl ErrorPayload {
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            kind: kind.to_string(),
            valid_range: None,
        }
    }
}

impl From<&ViewerError> for ErrorPayload {
    fn from(err: &ViewerError) -> Self {
        let valid_range = match err {
            ViewerError::IndexOutOfRange { count, .. }
            | ViewerError::TriangleOutOfRange { count, .. } => Some([0, *count]),
            _ => None,
        };
        Self {
            valid_range,
            ..Self::new(err.kind(), err.to_string())
        }
    }
}

/// Either outcome of a selection request, serialized without a wrapper.
///
/// `Err` is listed first: an error body would otherwise also parse as a
/// response, whose fields are all optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionReply {
    Err(ErrorPayload),
    Ok(SelectionResponse),
}

impl SelectionReply {
    pub fn is_success(&self) -> bool {
        matches!(self, SelectionReply::Ok(_))
    }
}

/// One event as carried on the live update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub name: String,
    pub revision: u64,
    pub removed: bool,
    pub hash: String,
    pub timestamp: f64,
}

impl From<&ShowEvent> for WireEvent {
    fn from(event: &ShowEvent) -> Self {
        Self {
            name: event.name.clone(),
            revision: event.revision,
            removed: event.removed,
            hash: event.content_hash.to_string(),
            timestamp: event.timestamp,
        }
    }
}
