use thiserror::Error;

use crate::types::JsonRpcRequest;

const MAX_METHOD_LEN: usize = 128;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("call is not a JSON object")]
    NotAnObject,

    #[error("missing 'method'")]
    MissingMethod,

    #[error("invalid method name: {0}")]
    InvalidMethod(String),

    #[error("missing 'params' for method {0}")]
    MissingParams(String),

    #[error("incorrectly formatted 'params' for method {0}: must be list or dict")]
    InvalidParams(String),

    #[error("invalid call: {0}")]
    InvalidCall(String),

    #[error("empty batch")]
    EmptyBatch,
}

impl JsonRpcRequest {
    /// Parses one inbound call from a JSON value and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the value is not an object, lacks a
    /// string `method`, or fails [`JsonRpcRequest::validate`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
        match object.get("method") {
            Some(serde_json::Value::String(_)) => {}
            Some(other) => return Err(ValidationError::InvalidMethod(other.to_string())),
            None => return Err(ValidationError::MissingMethod),
        }

        let request: Self = serde_json::from_value(value)
            .map_err(|e| ValidationError::InvalidCall(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    /// Validates an inbound call.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidMethod`] if the method is empty, too long, or contains
    ///   characters other than alphanumerics, `_` and `.`
    /// - [`ValidationError::MissingParams`] if `params` is absent
    /// - [`ValidationError::InvalidParams`] if `params` is neither an array nor an object
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.method.is_empty() ||
            self.method.len() > MAX_METHOD_LEN ||
            !self.method.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(ValidationError::InvalidMethod(self.method.clone()));
        }

        match &self.params {
            None => Err(ValidationError::MissingParams(self.method.clone())),
            Some(serde_json::Value::Array(_) | serde_json::Value::Object(_)) => Ok(()),
            Some(_) => Err(ValidationError::InvalidParams(self.method.clone())),
        }
    }
}
