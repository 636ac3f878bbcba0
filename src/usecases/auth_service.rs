//! Interactive login flow: phone -> code -> optional 2FA password.
//!
//! Prompts on the terminal; the MTProto calls go through AuthPort.

use crate::domain::{DomainError, SignInResult};
use crate::ports::AuthPort;
use std::sync::Arc;
use tracing::info;

pub struct AuthService {
    auth: Arc<dyn AuthPort>,
    api_hash: String,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthPort>, api_hash: String) -> Self {
        Self { auth, api_hash }
    }

    /// Run the full auth flow. Returns immediately when the stored session is
    /// already authorized.
    pub async fn run_auth_flow(&self) -> Result<(), DomainError> {
        if self.auth.is_authenticated().await? {
            info!("session already authorized");
            return Ok(());
        }

        let phone = inquire::Text::new("Phone number (with country code, e.g. +79991234567):")
            .prompt()
            .map_err(|e| DomainError::Auth(format!("phone prompt: {}", e)))?;
        self.auth
            .request_login_code(phone.trim(), &self.api_hash)
            .await?;

        let code = inquire::Text::new("Login code from Telegram:")
            .prompt()
            .map_err(|e| DomainError::Auth(format!("code prompt: {}", e)))?;

        if let SignInResult::PasswordRequired { hint } = self.auth.sign_in(code.trim()).await? {
            let label = match hint {
                Some(h) if !h.is_empty() => format!("2FA password (hint: {}):", h),
                _ => "2FA password:".to_string(),
            };
            let password = inquire::Password::new(&label)
                .without_confirmation()
                .prompt()
                .map_err(|e| DomainError::Auth(format!("password prompt: {}", e)))?;
            self.auth.check_password(password.as_bytes()).await?;
        }

        info!("authentication complete");
        Ok(())
    }
}
