//! Payload shaping shared by intake and edit-approve.

use serde_json::json;

use crate::domain::record_schema::{Completeness, SchemaViolation, schema_for};
use crate::domain::{ChangeType, Error, FieldMap, Operation};

/// Map a schema violation onto a 422 error naming the offending field.
pub(crate) fn schema_violation_error(violation: &SchemaViolation) -> Error {
    Error::unprocessable(violation.to_string()).with_details(json!({
        "field": violation.field(),
        "code": "schema_violation",
    }))
}

/// Shape-check a proposed payload and expand update payloads into the
/// complete desired record state by overlaying them on `snapshot`.
///
/// Required fields and references are left to the gateway so a proposal that
/// cannot be applied yet still reaches the review queue.
pub(crate) fn prepare_payload(
    change_type: ChangeType,
    operation: Operation,
    snapshot: Option<&FieldMap>,
    payload: FieldMap,
) -> Result<FieldMap, Error> {
    match operation {
        Operation::Delete => {
            if payload.is_empty() {
                Ok(payload)
            } else {
                Err(
                    Error::unprocessable("delete proposals must not carry a payload")
                        .with_details(json!({
                            "field": "payload",
                            "code": "unexpected_payload",
                        })),
                )
            }
        }
        Operation::Create => {
            schema_for(change_type)
                .validate(&payload, Completeness::Partial)
                .map_err(|violation| schema_violation_error(&violation))?;
            Ok(payload)
        }
        Operation::Update => {
            if payload.is_empty() {
                return Err(
                    Error::unprocessable("update proposals must change at least one field")
                        .with_details(json!({
                            "field": "payload",
                            "code": "empty_payload",
                        })),
                );
            }
            schema_for(change_type)
                .validate(&payload, Completeness::Partial)
                .map_err(|violation| schema_violation_error(&violation))?;
            let mut desired = snapshot.cloned().unwrap_or_default();
            desired.extend(payload);
            Ok(desired)
        }
    }
}
