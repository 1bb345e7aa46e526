//! Random passwords for provisioned accounts.

use rand::Rng;

/// Length used when the configuration does not override it.
pub const DEFAULT_PASSWORD_LENGTH: usize = 12;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

/// Generates a random password of `length` characters drawn uniformly from
/// ASCII letters, digits and `!@#$%^&*`.
///
/// # Example
///
/// ```
/// use tempmail_sync::generate_password;
///
/// let password = generate_password(16);
/// assert_eq!(password.len(), 16);
/// ```
#[must_use]
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}
