//! A scriptable identity provider.
//!
//! Responses are queued per method and played back in order. Methods
//! that return data fail loudly when unscripted; fire-and-forget
//! methods default to success so most tests only script the calls they
//! care about. Every call is logged for order assertions.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use aegis_auth::provider::{
    AuthResponse, DeviceVerifierAttributes, IdentityCredentials, IdentityProviderClient,
    InitiateAuthRequest, RespondToChallengeRequest, ServiceError, UserProfile,
};

type Script<T> = Mutex<VecDeque<Result<T, ServiceError>>>;

#[derive(Default)]
pub struct MockIdentityProvider {
    initiate_auth: Script<AuthResponse>,
    respond_to_challenge: Script<AuthResponse>,
    confirm_device: Script<()>,
    global_sign_out: Script<()>,
    forgot_password: Script<()>,
    confirm_forgot_password: Script<()>,
    get_user: Script<UserProfile>,
    revoke_token: Script<()>,
    delete_user: Script<()>,
    identity_credentials: Script<IdentityCredentials>,

    calls: Mutex<Vec<&'static str>>,
    initiate_requests: Mutex<Vec<InitiateAuthRequest>>,
    challenge_requests: Mutex<Vec<RespondToChallengeRequest>>,
    confirmed_devices: Mutex<Vec<(String, DeviceVerifierAttributes)>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_initiate_auth(&self, response: Result<AuthResponse, ServiceError>) {
        self.initiate_auth.lock().push_back(response);
    }

    pub fn enqueue_respond_to_challenge(&self, response: Result<AuthResponse, ServiceError>) {
        self.respond_to_challenge.lock().push_back(response);
    }

    pub fn enqueue_confirm_device(&self, response: Result<(), ServiceError>) {
        self.confirm_device.lock().push_back(response);
    }

    pub fn enqueue_global_sign_out(&self, response: Result<(), ServiceError>) {
        self.global_sign_out.lock().push_back(response);
    }

    pub fn enqueue_forgot_password(&self, response: Result<(), ServiceError>) {
        self.forgot_password.lock().push_back(response);
    }

    pub fn enqueue_confirm_forgot_password(&self, response: Result<(), ServiceError>) {
        self.confirm_forgot_password.lock().push_back(response);
    }

    pub fn enqueue_get_user(&self, response: Result<UserProfile, ServiceError>) {
        self.get_user.lock().push_back(response);
    }

    pub fn enqueue_revoke_token(&self, response: Result<(), ServiceError>) {
        self.revoke_token.lock().push_back(response);
    }

    pub fn enqueue_delete_user(&self, response: Result<(), ServiceError>) {
        self.delete_user.lock().push_back(response);
    }

    pub fn enqueue_identity_credentials(
        &self,
        response: Result<IdentityCredentials, ServiceError>,
    ) {
        self.identity_credentials.lock().push_back(response);
    }

    /// Method names in the order the engine called them.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Every `initiate_auth` request received, in order.
    pub fn initiate_requests(&self) -> Vec<InitiateAuthRequest> {
        self.initiate_requests.lock().clone()
    }

    /// Every `respond_to_challenge` request received, in order.
    pub fn challenge_requests(&self) -> Vec<RespondToChallengeRequest> {
        self.challenge_requests.lock().clone()
    }

    /// Device keys confirmed, with their verifier attributes.
    pub fn confirmed_devices(&self) -> Vec<(String, DeviceVerifierAttributes)> {
        self.confirmed_devices.lock().clone()
    }

    fn log(&self, method: &'static str) {
        self.calls.lock().push(method);
    }

    fn play<T>(&self, script: &Script<T>, method: &'static str) -> Result<T, ServiceError> {
        script.lock().pop_front().unwrap_or_else(|| {
            Err(ServiceError::Service(format!(
                "no scripted response for {method}"
            )))
        })
    }

    fn play_unit(&self, script: &Script<()>) -> Result<(), ServiceError> {
        script.lock().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl IdentityProviderClient for MockIdentityProvider {
    async fn initiate_auth(
        &self,
        request: InitiateAuthRequest,
    ) -> Result<AuthResponse, ServiceError> {
        self.log("initiate_auth");
        self.initiate_requests.lock().push(request);
        self.play(&self.initiate_auth, "initiate_auth")
    }

    async fn respond_to_challenge(
        &self,
        request: RespondToChallengeRequest,
    ) -> Result<AuthResponse, ServiceError> {
        self.log("respond_to_challenge");
        self.challenge_requests.lock().push(request);
        self.play(&self.respond_to_challenge, "respond_to_challenge")
    }

    async fn confirm_device(
        &self,
        _access_token: &str,
        device_key: &str,
        verifier: DeviceVerifierAttributes,
    ) -> Result<(), ServiceError> {
        self.log("confirm_device");
        self.confirmed_devices
            .lock()
            .push((device_key.to_owned(), verifier));
        self.play_unit(&self.confirm_device)
    }

    async fn global_sign_out(&self, _access_token: &str) -> Result<(), ServiceError> {
        self.log("global_sign_out");
        self.play_unit(&self.global_sign_out)
    }

    async fn forgot_password(
        &self,
        _client_id: &str,
        _secret_hash: Option<&str>,
        _username: &str,
    ) -> Result<(), ServiceError> {
        self.log("forgot_password");
        self.play_unit(&self.forgot_password)
    }

    async fn confirm_forgot_password(
        &self,
        _client_id: &str,
        _secret_hash: Option<&str>,
        _username: &str,
        _confirmation_code: &str,
        _new_password: &str,
    ) -> Result<(), ServiceError> {
        self.log("confirm_forgot_password");
        self.play_unit(&self.confirm_forgot_password)
    }

    async fn get_user(&self, _access_token: &str) -> Result<UserProfile, ServiceError> {
        self.log("get_user");
        self.play(&self.get_user, "get_user")
    }

    async fn revoke_token(
        &self,
        _client_id: &str,
        _client_secret: Option<&str>,
        _refresh_token: &str,
    ) -> Result<(), ServiceError> {
        self.log("revoke_token");
        self.play_unit(&self.revoke_token)
    }

    async fn delete_user(&self, _access_token: &str) -> Result<(), ServiceError> {
        self.log("delete_user");
        self.play_unit(&self.delete_user)
    }

    async fn fetch_identity_credentials(
        &self,
        _identity_pool_id: &str,
        _id_token: Option<&str>,
    ) -> Result<IdentityCredentials, ServiceError> {
        self.log("fetch_identity_credentials");
        self.play(&self.identity_credentials, "fetch_identity_credentials")
    }
}
