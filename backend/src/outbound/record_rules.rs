//! Validation shared by every target record gateway.

use crate::domain::ports::TargetRecordGatewayError;
use crate::domain::{Completeness, FieldMap, TargetRef, TargetTable, schema_for_table};

/// Check `fields` against the complete schema of `table`.
///
/// Returns the records the fields reference so the caller can confirm they
/// exist inside its own write transaction.
pub(crate) fn validate_record(
    table: &TargetTable,
    fields: &FieldMap,
) -> Result<Vec<TargetRef>, TargetRecordGatewayError> {
    let schema = schema_for_table(table).ok_or_else(|| {
        TargetRecordGatewayError::validation(format!("unknown record table `{table}`"))
    })?;
    schema
        .validate(fields, Completeness::Complete)
        .map_err(|violation| TargetRecordGatewayError::validation(violation.to_string()))
}

/// Error for a reference to a record that does not exist.
pub(crate) fn dangling_reference(reference: &TargetRef) -> TargetRecordGatewayError {
    TargetRecordGatewayError::validation(format!("referenced record {reference} does not exist"))
}
