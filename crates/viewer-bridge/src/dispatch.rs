use tracing::debug;
use viewer_core::Viewer;
use viewer_types::TopoKind;

use crate::error::BridgeError;
use crate::messages::{
    ActionOnly, SelectionAction, SelectionReply, SelectionRequest, SelectionResponse,
};

const ENCODE_FAILURE: &str =
    r#"{"success":false,"error":"failed to encode response","kind":"encode"}"#;

/// Dispatch a selection request and return a reply.
///
/// Failures never propagate: they become typed error payloads the browser
/// can show next to the pick.
pub fn dispatch_selection(viewer: &Viewer, request: SelectionRequest) -> SelectionReply {
    match handle_selection(viewer, request) {
        Ok(response) => SelectionReply::Ok(response),
        Err(e) => {
            debug!(error = %e, "selection rejected");
            SelectionReply::Err(e.to_payload())
        }
    }
}

fn handle_selection(
    viewer: &Viewer,
    request: SelectionRequest,
) -> Result<SelectionResponse, BridgeError> {
    match request.action {
        SelectionAction::Deselect => Ok(deselect(viewer, request.object_name)),
        SelectionAction::Select => {
            let object_name = required(request.object_name, "objectName")?;
            let kind: TopoKind = required(request.selection_type, "selectionType")?
                .parse()
                .map_err(|e: viewer_types::ParseTopoKindError| BridgeError::BadRequest {
                    reason: e.to_string(),
                })?;
            let index = required(request.geometry_index, "geometryIndex")?;

            let result = viewer.select(&object_name, kind, index)?;
            Ok(result.into())
        }
    }
}

fn deselect(viewer: &Viewer, object_name: Option<String>) -> SelectionResponse {
    if let Some(name) = &object_name {
        viewer.deselect(name);
    }
    SelectionResponse::deselected(object_name)
}

fn required<T>(field: Option<T>, name: &str) -> Result<T, BridgeError> {
    field.ok_or_else(|| BridgeError::BadRequest {
        reason: format!("select requires {name}"),
    })
}

/// Parse a JSON selection request, dispatch it and serialize the reply.
///
/// A body that names the deselect action succeeds even when its other
/// fields are malformed.
pub fn dispatch_selection_json(viewer: &Viewer, body: &str) -> String {
    let reply = match serde_json::from_str::<SelectionRequest>(body) {
        Ok(request) => dispatch_selection(viewer, request),
        Err(e) => match serde_json::from_str::<ActionOnly>(body) {
            Ok(ActionOnly {
                action: SelectionAction::Deselect,
            }) => {
                debug!(error = %e, "deselect with malformed fields");
                SelectionReply::Ok(deselect(viewer, None))
            }
            _ => SelectionReply::Err(
                BridgeError::BadRequest {
                    reason: e.to_string(),
                }
                .to_payload(),
            ),
        },
    };
    serde_json::to_string(&reply).unwrap_or_else(|_| ENCODE_FAILURE.to_string())
}
