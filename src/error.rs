// Errors - boundary failures and the status codes they collapse into
//
// Vulkan plumbing inside the crate reports anyhow::Error; only the checks
// the boundary performs itself get a dedicated variant here.

use thiserror::Error;

/// Status returned across the C boundary.
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status_code {
    Success = 0,
    Failure = 1,
    Invalid_handle = 2,
}

/// Failures detected by the boundary before any Vulkan work happens.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BridgeError {
    #[error("{0} must not be null")]
    NullPointer(&'static str),

    #[error("window extent must be non-zero, got {width}x{height}")]
    ZeroExtent { width: u32, height: u32 },

    #[error("vulkan path is not valid UTF-8")]
    InvalidPath,

    #[error("raw window pointers are not supported on this platform")]
    UnsupportedWindow,

    #[error("no live vulkan application for handle {0}")]
    InvalidHandle(u64),
}

impl From<&anyhow::Error> for Status_code {
    fn from(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<BridgeError>() {
            Some(BridgeError::InvalidHandle(_)) => Status_code::Invalid_handle,
            _ => Status_code::Failure,
        }
    }
}

impl<T> From<&anyhow::Result<T>> for Status_code {
    fn from(result: &anyhow::Result<T>) -> Self {
        match result {
            Ok(_) => Status_code::Success,
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn status_values_are_stable() {
        assert_eq!(Status_code::Success as i32, 0);
        assert_eq!(Status_code::Failure as i32, 1);
        assert_eq!(Status_code::Invalid_handle as i32, 2);
    }

    #[test]
    fn invalid_handle_survives_context() {
        let result: anyhow::Result<()> =
            Err(BridgeError::InvalidHandle(7)).context("drawing frame");
        assert_eq!(Status_code::from(&result), Status_code::Invalid_handle);
    }

    #[test]
    fn other_errors_are_failures() {
        let result: anyhow::Result<()> = Err(BridgeError::ZeroExtent { width: 0, height: 600 }.into());
        assert_eq!(Status_code::from(&result), Status_code::Failure);

        let result: anyhow::Result<()> = Err(anyhow::anyhow!("device lost"));
        assert_eq!(Status_code::from(&result), Status_code::Failure);

        assert_eq!(Status_code::from(&anyhow::Ok(())), Status_code::Success);
    }

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            BridgeError::ZeroExtent { width: 0, height: 600 }.to_string(),
            "window extent must be non-zero, got 0x600"
        );
        assert_eq!(
            BridgeError::NullPointer("window_handle").to_string(),
            "window_handle must not be null"
        );
    }
}
