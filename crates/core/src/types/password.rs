//! Password policy.
//!
//! Plain passwords never leave the request that carries them, so there is no
//! password type here - only the length rule shared by registration, password
//! reset and account updates.

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 68;

/// Errors returned by [`validate_password`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// Password shorter than [`MIN_PASSWORD_LENGTH`].
    #[error("Ensure this field has at least {min} characters.")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// Password longer than [`MAX_PASSWORD_LENGTH`].
    #[error("Ensure this field has no more than {max} characters.")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// Check a candidate password against the length policy.
///
/// # Errors
///
/// Returns `PasswordError` if the password is too short or too long.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong {
            max: MAX_PASSWORD_LENGTH,
        });
    }
    Ok(())
}
