//! Vultr binding of the shared connection adapter.
//!
//! The API key rides along as the `api_key` query parameter on every call (injected by
//! [`compute_core::client::Auth`]), listings are plain GETs and state changes are
//! form-encoded POSTs. Vultr reports errors as bare text, so any non-success status becomes
//! [`Error::Transport`] carrying that text verbatim.

use compute_core::client::{ApiResponse, ServiceClient};
use compute_core::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use url::Url;

/// Vultr API host.
pub const DEFAULT_BASE_URL: &str = "https://api.vultr.com";

/// Name of the query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "api_key";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Authenticated connection to the Vultr API.
#[derive(Clone)]
pub struct VultrConnection {
    inner: ServiceClient,
}

impl VultrConnection {
    /// Wrap a service client that already carries the API key.
    #[must_use]
    pub const fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }

    /// Return the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// Issue a GET.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] for non-success statuses and transport errors otherwise.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.inner
            .execute_with_retry(
                Method::GET,
                path,
                &[],
                |request| request.header(ACCEPT, "application/json"),
                map_status_to_error,
            )
            .await
    }

    /// Issue a form-encoded POST.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] for non-success statuses and transport errors otherwise.
    pub async fn post(&self, path: &str, form: &[(String, String)]) -> Result<ApiResponse> {
        self.inner
            .execute_with_retry(
                Method::POST,
                path,
                &[],
                |request| request.header(CONTENT_TYPE, FORM_CONTENT_TYPE).form(form),
                map_status_to_error,
            )
            .await
    }
}

fn map_status_to_error(status: StatusCode, text: String) -> Error {
    Error::Transport {
        status: status.as_u16(),
        body: text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute_core::client::{Auth, RetryPolicy, ServiceClientBuilder};
    use compute_core::Provider;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection(server: &MockServer) -> VultrConnection {
        let client =
            ServiceClientBuilder::new(Provider::Vultr, server.uri(), Duration::from_secs(5))
                .unwrap()
                .with_retry_policy(RetryPolicy::no_retry())
                .with_auth(Auth::query_param(API_KEY_PARAM, "test-key"))
                .build()
                .unwrap();
        VultrConnection::new(client)
    }

    #[tokio::test]
    async fn post_is_form_encoded_and_authenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/server/reboot"))
            .and(query_param("api_key", "test-key"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string("SUBID=576965"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let response = connection(&server)
            .post(
                "/v1/server/reboot",
                &[("SUBID".to_string(), "576965".to_string())],
            )
            .await
            .unwrap();
        assert!(response.is_ok());
        assert_eq!(response.text(), "");
    }

    #[tokio::test]
    async fn error_text_is_kept_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/server/list"))
            .respond_with(ResponseTemplate::new(412).set_body_string("Invalid API key."))
            .mount(&server)
            .await;

        let err = connection(&server).get("/v1/server/list").await.unwrap_err();
        assert_eq!(
            err,
            Error::Transport {
                status: 412,
                body: "Invalid API key.".to_string()
            }
        );
    }
}
