//! AuthPort over the grammers client: code login with optional 2FA.
//!
//! The flow is stateful (request code, submit code, maybe submit password).
//! The adapter tracks where the login stands so out-of-order calls fail with
//! a clear message, and a consumed token can never be submitted twice.

use crate::domain::{DomainError, SignInResult};
use crate::ports::AuthPort;
use async_trait::async_trait;
use grammers_client::Client;
use grammers_client::client::{LoginToken, PasswordToken};
use tokio::sync::Mutex;

/// Where the interactive login currently stands.
enum LoginStage<C, P> {
    Idle,
    CodeSent(C),
    PasswordNeeded(P),
}

impl<C, P> LoginStage<C, P> {
    /// Consume the pending code token. Leaves the stage untouched when the
    /// login is not waiting for a code.
    fn take_code_token(&mut self) -> Result<C, DomainError> {
        match std::mem::replace(self, LoginStage::Idle) {
            LoginStage::CodeSent(token) => Ok(token),
            other => {
                *self = other;
                Err(DomainError::Auth(
                    "no login code pending; request a code first".into(),
                ))
            }
        }
    }

    /// Consume the pending 2FA challenge.
    fn take_password_token(&mut self) -> Result<P, DomainError> {
        match std::mem::replace(self, LoginStage::Idle) {
            LoginStage::PasswordNeeded(token) => Ok(token),
            other => {
                *self = other;
                Err(DomainError::Auth(
                    "no 2FA challenge pending; submit the login code first".into(),
                ))
            }
        }
    }
}

/// Auth adapter over a grammers Client clone (same session as the gateway).
pub struct GrammersAuthAdapter {
    client: Client,
    stage: Mutex<LoginStage<LoginToken, PasswordToken>>,
}

impl GrammersAuthAdapter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            stage: Mutex::new(LoginStage::Idle),
        }
    }
}

#[async_trait]
impl AuthPort for GrammersAuthAdapter {
    async fn is_authenticated(&self) -> Result<bool, DomainError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| DomainError::Auth(format!("authorization check: {}", e)))
    }

    async fn request_login_code(&self, phone: &str, api_hash: &str) -> Result<(), DomainError> {
        let token = self
            .client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| DomainError::Auth(format!("could not send a login code: {}", e)))?;
        *self.stage.lock().await = LoginStage::CodeSent(token);
        Ok(())
    }

    async fn sign_in(&self, code: &str) -> Result<SignInResult, DomainError> {
        let mut stage = self.stage.lock().await;
        let token = stage.take_code_token()?;
        match self.client.sign_in(&token, code).await {
            Ok(_) => Ok(SignInResult::Success),
            Err(grammers_client::SignInError::PasswordRequired(challenge)) => {
                let hint = challenge.hint().map(String::from);
                *stage = LoginStage::PasswordNeeded(challenge);
                Ok(SignInResult::PasswordRequired { hint })
            }
            Err(grammers_client::SignInError::InvalidCode) => Err(DomainError::Auth(
                "the login code was rejected; restart the login and retype it".into(),
            )),
            Err(grammers_client::SignInError::SignUpRequired) => Err(DomainError::Auth(
                "this phone number has no account; register it in an official client first".into(),
            )),
            Err(e) => Err(DomainError::Auth(format!("sign-in failed: {}", e))),
        }
    }

    async fn check_password(&self, password: &[u8]) -> Result<(), DomainError> {
        let challenge = self.stage.lock().await.take_password_token()?;
        self.client
            .check_password(challenge, password)
            .await
            .map_err(|e| DomainError::Auth(format!("2FA password rejected: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_token_is_only_consumable_after_a_code_was_sent() {
        let mut stage: LoginStage<u8, u8> = LoginStage::Idle;
        assert!(stage.take_code_token().is_err());

        stage = LoginStage::CodeSent(1);
        assert_eq!(stage.take_code_token().unwrap(), 1);
        // Consumed: submitting a second code must fail, not reuse the token.
        assert!(stage.take_code_token().is_err());
    }

    #[test]
    fn password_challenge_survives_a_misordered_code_submit() {
        let mut stage: LoginStage<u8, u8> = LoginStage::PasswordNeeded(7);
        assert!(stage.take_code_token().is_err());
        assert_eq!(stage.take_password_token().unwrap(), 7);
    }

    #[test]
    fn password_submit_without_a_challenge_is_rejected() {
        let mut stage: LoginStage<u8, u8> = LoginStage::CodeSent(1);
        assert!(stage.take_password_token().is_err());
        // The pending code is still there afterwards.
        assert_eq!(stage.take_code_token().unwrap(), 1);
    }
}
