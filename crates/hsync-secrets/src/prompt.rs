//! Interactive password prompts (no echo)

use hsync_core::{HsyncError, HsyncResult};
use secrecy::{ExposeSecret, SecretString};

/// Read one password from the terminal.
pub fn read_password(prompt: &str) -> HsyncResult<SecretString> {
    let password = rpassword::prompt_password(prompt)
        .map_err(|e| anyhow::anyhow!("reading password from terminal: {e}"))?;
    Ok(SecretString::from(password))
}

/// Read a new password twice and require both entries to match.
pub fn read_new_password(prompt: &str) -> HsyncResult<SecretString> {
    let first = read_password(prompt)?;
    let second = read_password("Confirm: ")?;
    if first.expose_secret() != second.expose_secret() {
        return Err(HsyncError::Config("passwords do not match".into()));
    }
    if first.expose_secret().is_empty() {
        return Err(HsyncError::Config("Password is required".into()));
    }
    Ok(first)
}
