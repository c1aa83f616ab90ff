//! Shared validation helpers for inbound HTTP adapters.

use std::fmt::Display;
use std::str::FromStr;

use actix_web::web::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{Confidence, Error};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUuid,
    InvalidValue,
    OutOfRange,
    ConflictingFields,
    InvalidJson,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidValue => "invalid_value",
            ErrorCode::OutOfRange => "out_of_range",
            ErrorCode::ConflictingFields => "conflicting_fields",
            ErrorCode::InvalidJson => "invalid_json",
        }
    }
}

/// Builder for validation errors with field context.
struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }

    fn with_index(self, code: ErrorCode, index: usize, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "index": index,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn missing_field_error(field: &str) -> Error {
    ValidationError::new(field, format!("missing required field: {field}"))
        .with_code(ErrorCode::MissingField)
}

pub(crate) fn invalid_uuid_error(field: &str, value: &str) -> Error {
    ValidationError::new(field, format!("{field} must be a valid UUID"))
        .with_value(ErrorCode::InvalidUuid, value)
}

pub(crate) fn invalid_uuid_index_error(field: &str, index: usize, value: &str) -> Error {
    ValidationError::new(field, format!("{field} must contain valid UUIDs")).with_index(
        ErrorCode::InvalidUuid,
        index,
        value,
    )
}

pub(crate) fn conflicting_fields_error(first: &str, second: &str) -> Error {
    ValidationError::new(first, format!("{first} and {second} cannot be combined"))
        .with_code(ErrorCode::ConflictingFields)
}

pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| invalid_uuid_error(field, value))
}

pub(crate) fn parse_uuid_list(values: Vec<String>, field: &str) -> Result<Vec<Uuid>, Error> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            Uuid::parse_str(&value).map_err(|_| invalid_uuid_index_error(field, index, &value))
        })
        .collect()
}

/// Parse a wire value such as a status or operation name.
pub(crate) fn parse_wire<T>(value: &str, field: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|err: T::Err| {
        ValidationError::new(field, err.to_string()).with_value(ErrorCode::InvalidValue, value)
    })
}

/// Wrap a constructor error for a free-form identifier field.
pub(crate) fn invalid_value_error(field: &str, value: &str, reason: impl Display) -> Error {
    ValidationError::new(field, format!("{field} is invalid: {reason}"))
        .with_value(ErrorCode::InvalidValue, value)
}

/// Scores outside `[0, 1]` are reported as unprocessable, not malformed.
pub(crate) fn parse_confidence(value: f64, field: &str) -> Result<Confidence, Error> {
    Confidence::new(value).map_err(|err| {
        Error::unprocessable(err.to_string()).with_details(json!({
            "field": field,
            "value": value,
            "code": ErrorCode::OutOfRange.as_str(),
        }))
    })
}

/// Decode an optional JSON body. An empty body yields the default value.
pub(crate) fn parse_optional_json<T>(body: &Bytes) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| invalid_json_error(&err))
}

pub(crate) fn invalid_json_error(err: &impl Display) -> Error {
    Error::invalid_request(format!("request body is not valid JSON: {err}"))
        .with_details(json!({ "code": ErrorCode::InvalidJson.as_str() }))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{ErrorCode as DomainCode, ProposalStatus};
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct VersionBody {
        expected_version: Option<u32>,
    }

    fn detail<'a>(err: &'a Error, key: &str) -> Option<&'a serde_json::Value> {
        err.details().and_then(|value| value.get(key))
    }

    #[rstest]
    fn uuid_list_reports_offending_index() {
        let err = parse_uuid_list(
            vec![Uuid::nil().to_string(), "nope".to_owned()],
            "ids",
        )
        .expect_err("second entry is invalid");

        assert_eq!(err.code(), DomainCode::InvalidRequest);
        assert_eq!(detail(&err, "index"), Some(&json!(1)));
        assert_eq!(detail(&err, "code"), Some(&json!("invalid_uuid")));
    }

    #[rstest]
    #[case("pending", Some(ProposalStatus::Pending))]
    #[case("applied", Some(ProposalStatus::Applied))]
    #[case("Applied", None)]
    #[case("done", None)]
    fn wire_values_parse_exactly(#[case] raw: &str, #[case] expected: Option<ProposalStatus>) {
        let parsed = parse_wire::<ProposalStatus>(raw, "status").ok();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn confidence_out_of_range_is_unprocessable(#[case] value: f64) {
        let err = parse_confidence(value, "minConfidence").expect_err("out of range");
        assert_eq!(err.code(), DomainCode::UnprocessableEntity);
        assert_eq!(detail(&err, "field"), Some(&json!("minConfidence")));
    }

    #[rstest]
    #[case(b"".as_slice(), VersionBody::default())]
    #[case(b"  \n".as_slice(), VersionBody::default())]
    #[case(br#"{"expectedVersion": 3}"#.as_slice(), VersionBody { expected_version: Some(3) })]
    fn optional_body_falls_back_to_default(#[case] raw: &[u8], #[case] expected: VersionBody) {
        let body = Bytes::copy_from_slice(raw);
        let parsed: VersionBody = parse_optional_json(&body).expect("body parses");
        assert_eq!(parsed, expected);
    }

    #[rstest]
    fn malformed_body_is_invalid_request() {
        let body = Bytes::from_static(b"{\"expectedVersion\":");
        let err = parse_optional_json::<VersionBody>(&body).expect_err("truncated JSON");
        assert_eq!(err.code(), DomainCode::InvalidRequest);
        assert_eq!(detail(&err, "code"), Some(&json!("invalid_json")));
    }
}
