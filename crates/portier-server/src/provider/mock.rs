//! Recording provider for route tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use portier_auth::RequestContext;

use super::{
    AuthRequest, CompleteAuthorization, CompletedAuthorization, OAuthProvider, ProviderError,
};

pub(crate) const MOCK_REDIRECT: &str = "https://client.example/cb?code=mock-code&state=s1";

#[derive(Debug, Default)]
pub(crate) struct MockProvider {
    reject_requests: bool,
    fail_completion: bool,
    completions: Mutex<Vec<CompleteAuthorization>>,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn rejecting_requests() -> Self {
        Self {
            reject_requests: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_completion() -> Self {
        Self {
            fail_completion: true,
            ..Self::default()
        }
    }

    pub(crate) fn completions(&self) -> Vec<CompleteAuthorization> {
        self.completions.lock().clone()
    }
}

pub(crate) fn sample_request() -> AuthRequest {
    AuthRequest {
        response_type: "code".to_string(),
        client_id: "abc".to_string(),
        redirect_uri: "https://client.example/cb".to_string(),
        scope: vec!["read".to_string()],
        state: "s1".to_string(),
        code_challenge: None,
        code_challenge_method: None,
        extra: Default::default(),
    }
}

#[async_trait]
impl OAuthProvider for MockProvider {
    async fn parse_auth_request(
        &self,
        ctx: &RequestContext,
    ) -> Result<AuthRequest, ProviderError> {
        if self.reject_requests {
            return Err(ProviderError::InvalidRequest("mock rejection".to_string()));
        }
        let mut request = sample_request();
        if let Some(client_id) = ctx.query_param("client_id") {
            request.client_id = client_id;
        }
        Ok(request)
    }

    async fn complete_authorization(
        &self,
        completion: CompleteAuthorization,
    ) -> Result<CompletedAuthorization, ProviderError> {
        self.completions.lock().push(completion);
        if self.fail_completion {
            return Err(ProviderError::InvalidGrant("mock failure".to_string()));
        }
        Ok(CompletedAuthorization {
            redirect_to: MOCK_REDIRECT.to_string(),
        })
    }
}
