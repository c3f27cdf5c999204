//! Thin wrappers over the REST endpoints. Every call goes through `ApiClient`;
//! required fields are checked here so a blank form never reaches the network.

pub mod academic;
pub mod auth;
pub mod emails;
pub mod payment;
pub mod resumes;
pub mod stats;

use crate::errors::ClientError;

/// Rejects a blank required field before any request is made.
pub(crate) fn require(field: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_blank() {
        let err = require("Email", "   ").unwrap_err();
        assert_eq!(err.message(), "Email is required");
        assert!(require("Email", "a@x.io").is_ok());
    }
}
