//! JSON envelope printed by every command.

use b3_core::AppState;
use serde::Serialize;

/// `{ok, data?, error?}` wrapper around command output.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Build a response from a transport result.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

impl<'a, T> ApiResponse<&'a T> {
    /// Build a response from one slice of the store state. The global error
    /// wins over whatever the slice holds.
    pub fn from_state(state: &AppState, slice: Option<&'a T>) -> Self {
        if let Some(error) = &state.error {
            return Self::err(error.clone());
        }
        match slice {
            Some(data) => Self::ok(data),
            None => Self::err("No data"),
        }
    }
}
