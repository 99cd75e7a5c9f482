use tracing::{debug, warn};

use mingle_types::api::{Profile, VerifyOtpRequest};

use crate::client::ApiClient;
use crate::error::ClientError;

/// Who is signed in, as seen by the client. The token itself lives on the
/// shared [`ApiClient`].
pub struct AuthSession {
    client: ApiClient,
    profile: Option<Profile>,
    loading: bool,
}

impl AuthSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            profile: None,
            loading: false,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_signed_in(&self) -> bool {
        self.profile.is_some()
    }

    /// Resume a stored token. A rejected token is discarded and leaves the
    /// session signed out; any other failure is returned.
    pub async fn restore(&mut self, token: String) -> Result<Option<&Profile>, ClientError> {
        self.loading = true;
        self.client.set_token(Some(token));
        let result = self.client.me().await;
        self.loading = false;

        match result {
            Ok(profile) => {
                debug!("Restored session for {}", profile.username);
                self.profile = Some(profile);
                Ok(self.profile.as_ref())
            }
            Err(e) if e.is_unauthorized() => {
                debug!("Stored token rejected, signing out");
                self.clear();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn request_code(&self, email: &str) -> Result<(), ClientError> {
        self.client.request_otp(email).await
    }

    pub async fn sign_up(&mut self, req: &VerifyOtpRequest) -> Result<&Profile, ClientError> {
        self.loading = true;
        let result = self.client.verify_otp(req).await;
        self.loading = false;
        let auth = result?;
        Ok(self.profile.insert(auth.user))
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&Profile, ClientError> {
        self.loading = true;
        let result = self.client.login(email, password).await;
        self.loading = false;
        let auth = result?;
        Ok(self.profile.insert(auth.user))
    }

    /// Sign out locally even if the server cannot be told.
    pub async fn sign_out(&mut self) {
        if self.client.token().is_none() {
            return;
        }
        if let Err(e) = self.client.logout().await {
            warn!("Logout request failed: {}", e);
        }
        self.clear();
    }

    /// Fetch the current profile again, e.g. after an edit.
    pub async fn refresh(&mut self) -> Result<&Profile, ClientError> {
        if self.client.token().is_none() {
            return Err(ClientError::NotSignedIn);
        }
        let profile = self.client.me().await?;
        Ok(self.profile.insert(profile))
    }

    fn clear(&mut self) {
        self.client.set_token(None);
        self.profile = None;
    }
}
