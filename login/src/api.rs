use async_trait::async_trait;
use staybook_backend_client::BffClient;
use staybook_protocol::AuthToken;
use staybook_protocol::LoginRequest;
use staybook_protocol::LoginSuccess;
use staybook_protocol::NormalizedError;
use staybook_protocol::Registration;
use staybook_protocol::RegistrationSuccess;

/// The auth endpoints the session store talks to.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginSuccess, NormalizedError>;

    async fn register(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationSuccess, NormalizedError>;

    /// Server-side token revocation. Best effort.
    async fn revoke(&self, token: &AuthToken) -> Result<(), NormalizedError>;
}

#[async_trait]
impl AuthApi for BffClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginSuccess, NormalizedError> {
        BffClient::login(self, request).await
    }

    async fn register(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationSuccess, NormalizedError> {
        BffClient::register(self, registration).await
    }

    async fn revoke(&self, token: &AuthToken) -> Result<(), NormalizedError> {
        BffClient::revoke(self, token).await
    }
}
