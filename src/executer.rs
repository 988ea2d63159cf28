//! Provides an asynchronous execution framework for sending HTTP requests to Google.
//!
//! This module:
//! - Defines the Executer trait, which provides a unified interface for making HTTP requests.
//! - Implements executers for the discovery document, the code-for-token exchange and the user info request.
//!
//! Every executer wraps a `reqwest::Client`, so timeouts and proxies are
//! whatever the client was built with. Nothing here retries.

use std::{collections::HashMap, pin::Pin};

use http::StatusCode;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::error;

use crate::{
    discovery::{DiscoveryDocument, DiscoveryRequest},
    error::Error,
    id_token::{TokenExchangeRequest, TokenExchangeResponse},
    identity::{UserInfo, UserInfoRequest},
};

/// generic asynchronous execution interface for sending HTTP requests.
/// Key Components:
/// - Req: The request type that the executer will handle.
/// - Response: The expected response type.
/// - Error: The error type that will be returned on failure.
/// - Future: The asynchronous execution result, returning either Response or Error
pub trait Executer<'a, Req>
where
    Req: Send,
{
    type Response;
    type Error: std::error::Error;
    type Future: Future<Output = Result<Self::Response, Self::Error>> + Send + 'a;

    fn execute(&'a self, req: &'a Req) -> Self::Future;
}

type ExeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// Fetches the provider's discovery document.
#[derive(Debug, Clone)]
pub struct DiscoveryExe {
    client: Client,
}

impl DiscoveryExe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl<'a> Executer<'a, DiscoveryRequest> for DiscoveryExe {
    type Response = DiscoveryDocument;
    type Error = Error;
    type Future = ExeFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a DiscoveryRequest) -> Self::Future {
        Box::pin(async move {
            let url = parse_url(req.url())?;
            let res = self.client.get(url).send().await.map_err(send_error)?;
            read_json(res).await
        })
    }
}

/// Exchanges an authorization code for an access token and ID token.
#[derive(Debug, Clone)]
pub struct TokenExchangeExe {
    client: Client,
}

impl TokenExchangeExe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Request Workflow
/// 1. Parse the token endpoint URL.
/// 2. Prepare the request parameters.
/// 3. Send an HTTP POST request.
/// 4. Parse and return the response as TokenExchangeResponse.
impl<'a> Executer<'a, TokenExchangeRequest> for TokenExchangeExe {
    type Response = TokenExchangeResponse;
    type Error = Error;
    type Future = ExeFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a TokenExchangeRequest) -> Self::Future {
        Box::pin(async move {
            let url = parse_url(req.token_endpoint())?;

            let mut params = HashMap::new();
            params.insert("code", req.code());
            params.insert("client_id", req.client_id());
            params.insert("client_secret", req.client_secret());
            params.insert("redirect_uri", req.redirect_uri());
            params.insert("grant_type", req.grant_type());

            let res = self
                .client
                .post(url)
                .form(&params)
                .send()
                .await
                .map_err(send_error)?;
            read_json(res).await
        })
    }
}

/// Fetches the user's profile with an access token.
#[derive(Debug, Clone)]
pub struct UserInfoExe {
    client: Client,
}

impl UserInfoExe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl<'a> Executer<'a, UserInfoRequest> for UserInfoExe {
    type Response = UserInfo;
    type Error = Error;
    type Future = ExeFuture<'a, Self::Response>;

    fn execute(&'a self, req: &'a UserInfoRequest) -> Self::Future {
        Box::pin(async move {
            let url = parse_url(req.userinfo_endpoint())?;
            let res = self
                .client
                .get(url)
                .bearer_auth(req.access_token().value())
                .send()
                .await
                .map_err(send_error)?;
            read_json(res).await
        })
    }
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderErrorField {
    Detailed { message: String },
    // OAuth endpoints answer with a bare error code instead
    Code(String),
}

fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| {
        error!("Failed to parse url: {:?}", e);
        Error::URL
    })
}

fn send_error(e: reqwest::Error) -> Error {
    error!("Failed to send request: {:?}", e);
    Error::Network(e.to_string())
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, Error> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.map_err(send_error)?;
        let e = provider_error(status, &body);
        error!("Google responded with {}: {}", status, e);
        return Err(e);
    }
    res.json::<T>().await.map_err(|e| {
        error!("Failed to parse JSON: {:?}", e);
        Error::Deserialize
    })
}

/// Uses the message from Google's error body when there is one, otherwise the
/// raw status and body.
fn provider_error(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ProviderErrorBody>(body) {
        Ok(ProviderErrorBody {
            error: ProviderErrorField::Detailed { message },
        })
        | Ok(ProviderErrorBody {
            error: ProviderErrorField::Code(message),
        }) => Error::ProviderError(message),
        Err(_) => Error::ProviderError(format!("{}: {}", status, body)),
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use http::StatusCode;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header, method, path},
    };

    use super::{Executer, TokenExchangeExe, UserInfoExe, provider_error};
    use crate::{
        anti_forgery::AntiForgeryChecker,
        code::Code,
        config::GoogleAuthConfig,
        error::Error,
        id_token::{AccessToken, TokenExchangeRequest},
        identity::UserInfoRequest,
        secret::{Secret, SecretSnapshot, StaticSecrets},
    };

    #[test]
    fn test_provider_error_message() {
        let e = provider_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"invalid_grant"}}"#,
        );
        assert_eq!(e, Error::ProviderError("invalid_grant".to_string()));
    }

    #[test]
    fn test_provider_error_code() {
        let e = provider_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_client","error_description":"Unauthorized"}"#,
        );
        assert_eq!(e, Error::ProviderError("invalid_client".to_string()));
    }

    #[test]
    fn test_provider_error_raw() {
        let e = provider_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            e,
            Error::ProviderError("502 Bad Gateway: upstream down".to_string())
        );
    }

    #[tokio::test]
    async fn test_token_exchange_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=auth_code"))
            .and(body_string_contains("client_id=client_id"))
            .and(body_string_contains("client_secret=secret"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access",
                "expires_in": 3599,
                "id_token": "header.payload.signature",
                "scope": "openid email profile",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let checker = AntiForgeryChecker::new(StaticSecrets::new(SecretSnapshot::single(
            Secret::from("state-secret"),
        )));
        let config = GoogleAuthConfig::builder(checker)
            .client_id("client_id")
            .client_secret("secret")
            .redirect_url("https://redirect.example.com")
            .build();
        let req = TokenExchangeRequest::new(
            &config,
            &format!("{}/token", server.uri()),
            Code("auth_code".to_string()),
        );
        let res = TokenExchangeExe::new(Client::new())
            .execute(&req)
            .await
            .unwrap();
        assert_eq!(res.access_token(), &AccessToken("access".to_string()));
    }

    #[tokio::test]
    async fn test_user_info_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "123",
                "given_name": "Ada",
                "family_name": "Lovelace",
                "picture": "https://picture.example.com/ada.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let req = UserInfoRequest::new(
            &format!("{}/userinfo", server.uri()),
            AccessToken("access".to_string()),
        );
        let info = UserInfoExe::new(Client::new())
            .execute(&req)
            .await
            .unwrap();
        assert_eq!(info.given_name, "Ada");
        assert_eq!(info.family_name, "Lovelace");
        assert_eq!(
            info.picture.as_deref(),
            Some("https://picture.example.com/ada.png")
        );
    }

    #[tokio::test]
    async fn test_network_failure() {
        let req = UserInfoRequest::new(
            "http://127.0.0.1:9/userinfo",
            AccessToken("access".to_string()),
        );
        let res = UserInfoExe::new(Client::new()).execute(&req).await;
        assert!(matches!(res, Err(Error::Network(_))));
    }
}
