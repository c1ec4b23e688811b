//! Account password storage in the system keychain.
//!
//! - macOS: Keychain Services
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! Entries live under the service [`SERVICE`], one per account email.
//!
//! ```ignore
//! use polestar_store::keychain;
//!
//! keychain::store_password("driver@example.com", "hunter2")?;
//! let password = keychain::get_password("driver@example.com")?;
//! keychain::delete_password("driver@example.com")?;
//! ```

use keyring::Entry;
use tracing::debug;

use crate::error::StoreError;

/// Keychain service name for account passwords.
pub const SERVICE: &str = "polestar-bridge";

fn entry(email: &str) -> Result<Entry, StoreError> {
    Entry::new(SERVICE, email)
        .map_err(|e| StoreError::Keychain(format!("Failed to create keychain entry: {e}")))
}

/// Stores the password for `email`.
///
/// # Errors
///
/// Returns [`StoreError::Keychain`] if the keychain rejects the write.
pub fn store_password(email: &str, password: &str) -> Result<(), StoreError> {
    entry(email)?
        .set_password(password)
        .map_err(|e| StoreError::Keychain(format!("Failed to store password: {e}")))?;
    debug!(service = SERVICE, "Password stored in keychain");
    Ok(())
}

/// Retrieves the password for `email`.
///
/// Returns `Ok(None)` when no entry exists or the stored value is empty.
///
/// # Errors
///
/// Returns [`StoreError::Keychain`] if the keychain cannot be read.
pub fn get_password(email: &str) -> Result<Option<String>, StoreError> {
    match entry(email)?.get_password() {
        Ok(password) if password.is_empty() => Ok(None),
        Ok(password) => {
            debug!(service = SERVICE, "Password retrieved from keychain");
            Ok(Some(password))
        }
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(StoreError::Keychain(format!("Failed to read password: {e}"))),
    }
}

/// Deletes the password for `email`. A missing entry is not an error.
///
/// # Errors
///
/// Returns [`StoreError::Keychain`] if the deletion fails.
pub fn delete_password(email: &str) -> Result<(), StoreError> {
    match entry(email)?.delete_credential() {
        Ok(()) => {
            debug!(service = SERVICE, "Password deleted from keychain");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(StoreError::Keychain(format!("Failed to delete password: {e}"))),
    }
}
