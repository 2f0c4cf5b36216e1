use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    error::{AccountApiError, HttpError, Result},
    headers,
    request::{
        AccountsQuery, CreateAccountRequest, CreateMetersRequest, PatchAccountRequestBody,
        SetStatusRequestBody, UpdateAccountRequestBody, DEFAULT_PAGE_SIZE,
    },
    response::{Account, AccountStatus, ApiErrorBody, CapabilityEntry, ErrorKind, RoleEntry},
    routes,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const ACCOUNT_API_URL_ENV: &str = "NYM_ACCOUNT_API_URL";

/// Where the account service lives. Immutable once constructed; every call
/// on the client targets `base_url` unless the caller swaps it with
/// [`AccountApiClient::with_base_url`].
#[derive(Debug, Clone)]
pub struct Config {
    base_url: Url,
}

impl Config {
    /// A config pointing directly at the accounts endpoint, e.g.
    /// `https://example.com/accounts`.
    pub fn new(base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(AccountApiError::InvalidBaseUrl);
        }
        Ok(Self { base_url })
    }

    /// Appends the default `accounts` base path to a service origin.
    pub fn from_api_url(api_url: &Url) -> Result<Self> {
        let mut base_url = api_url.clone();
        base_url
            .path_segments_mut()
            .map_err(|()| AccountApiError::InvalidBaseUrl)?
            .pop_if_empty()
            .push(routes::ACCOUNTS);
        Self::new(base_url)
    }

    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var(ACCOUNT_API_URL_ENV)
            .map_err(|_| AccountApiError::MissingApiUrl)?
            .parse::<Url>()
            .map_err(AccountApiError::InvalidApiUrl)
            .inspect(|url| debug!("Using account api url: {url}"))?;
        Self::from_api_url(&api_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Thin client for the remote account-management API. One method per remote
/// operation, no retries, no local recovery: apart from the `NotFoundError`
/// special case in [`exists`](AccountApiClient::exists), every failure
/// propagates to the caller carrying the service's error payload.
#[derive(Debug, Clone)]
pub struct AccountApiClient {
    inner: reqwest::Client,
    base_url: Url,
}

impl AccountApiClient {
    pub fn new(config: Config) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(headers::ACCEPT_JSON_LD));
        let inner = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(AccountApiError::FailedToCreateClient)?;
        Ok(Self {
            inner,
            base_url: config.base_url,
        })
    }

    /// A handle sharing this client's connection pool but targeting a
    /// different base url. This is the per-call override: fall back to the
    /// configured default by calling the original client.
    pub fn with_base_url(&self, base_url: Url) -> Self {
        Self {
            inner: self.inner.clone(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Only fails for cannot-be-a-base urls, which Config::new rejects.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_get(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> std::result::Result<reqwest::Response, HttpError> {
        let mut url = self.endpoint(segments);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        debug!("GET {url}");
        Ok(self.inner.get(url).send().await?)
    }

    async fn get_json<T>(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> std::result::Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let response = self.send_get(segments, params).await?;
        parse_json_response(response).await
    }

    /// GET where only the status line matters (the `exists` probe).
    async fn get_ok(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> std::result::Result<(), HttpError> {
        let response = self.send_get(segments, params).await?;
        parse_empty_response(response).await
    }

    async fn post_json<T, B>(&self, segments: &[&str], body: &B) -> std::result::Result<T, HttpError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = self.endpoint(segments);
        debug!("POST {url}");
        let response = self.inner.post(url).json(body).send().await?;
        parse_json_response(response).await
    }

    async fn post_no_content<B>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> std::result::Result<(), HttpError>
    where
        B: Serialize,
    {
        let url = self.endpoint(segments);
        debug!("POST {url}");
        let response = self.inner.post(url).json(body).send().await?;
        parse_empty_response(response).await
    }

    async fn patch_no_content<B>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> std::result::Result<(), HttpError>
    where
        B: Serialize,
    {
        let url = self.endpoint(segments);
        debug!("PATCH {url}");
        // Header first: `json` only sets `Content-Type` when none is present.
        let response = self
            .inner
            .patch(url)
            .header(CONTENT_TYPE, headers::CONTENT_TYPE_JSON_PATCH)
            .json(body)
            .send()
            .await?;
        parse_empty_response(response).await
    }

    /// Checks whether an account with the given email exists.
    ///
    /// A success response means `true`. A failure whose payload carries the
    /// `NotFoundError` kind means `false`; any other failure propagates so
    /// callers can tell "account absent" from "service unreachable".
    pub async fn exists(&self, email: &str) -> Result<bool> {
        debug!("Checking account existence");
        match self
            .get_ok(&[], &[("exists", "true"), ("email", email)])
            .await
        {
            Ok(()) => Ok(true),
            Err(err) if err.error_kind() == Some(ErrorKind::NotFound) => Ok(false),
            Err(err) => Err(AccountApiError::FailedToCheckExistence(err)),
        }
    }

    /// Creates an account. The optional `authorization` proof is forwarded
    /// as-is; a missing or invalid email fails with whatever the service
    /// returns.
    pub async fn create(&self, request: &CreateAccountRequest) -> Result<Account> {
        debug!("Creating account");
        self.post_json(&[], request)
            .await
            .map_err(AccountApiError::FailedToCreateAccount)
    }

    pub async fn get(&self, id: &str) -> Result<Account> {
        debug!("Fetching account");
        self.get_json(&[id], &[])
            .await
            .map_err(AccountApiError::FailedToGetAccount)
    }

    /// Fetches one page of accounts matching the query. See
    /// [`AccountsQuery`] for the cursor contract.
    pub async fn get_accounts(&self, query: &AccountsQuery) -> Result<Vec<Account>> {
        debug!("Querying accounts");
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).to_string();
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(email) = &query.email {
            params.push(("email", email));
        }
        if let Some(after) = &query.after {
            params.push(("after", after));
        }
        params.push(("limit", &limit));
        self.get_json(&[], &params)
            .await
            .map_err(AccountApiError::FailedToQueryAccounts)
    }

    /// Overwrite-style update gated by `sequence` for optimistic
    /// concurrency. A stale sequence is rejected by the service with a
    /// conflict error (`AccountApiError::is_conflict`).
    pub async fn update(&self, sequence: u64, account: &Account) -> Result<()> {
        debug!("Updating account");
        let body = UpdateAccountRequestBody { sequence, account };
        self.post_no_content(&[&account.id], &body)
            .await
            .map_err(AccountApiError::FailedToUpdateAccount)
    }

    /// JSON-patch update, same `sequence` gate as [`update`]. `patch` is a
    /// list of RFC 6902 operations.
    pub async fn update_patch(
        &self,
        id: &str,
        sequence: u64,
        patch: Vec<serde_json::Value>,
    ) -> Result<()> {
        debug!("Patching account");
        let body = PatchAccountRequestBody { sequence, patch };
        self.patch_no_content(&[id], &body)
            .await
            .map_err(AccountApiError::FailedToPatchAccount)
    }

    pub async fn set_status(&self, id: &str, status: AccountStatus) -> Result<()> {
        debug!("Setting account status to {status}");
        let body = SetStatusRequestBody { status };
        self.post_no_content(&[id, routes::STATUS], &body)
            .await
            .map_err(AccountApiError::FailedToSetStatus)
    }

    pub async fn get_roles(&self, id: &str) -> Result<Vec<RoleEntry>> {
        debug!("Fetching account roles");
        self.get_json(&[id, routes::ROLES], &[])
            .await
            .map_err(AccountApiError::FailedToGetRoles)
    }

    pub async fn get_caps(&self, id: &str) -> Result<Vec<CapabilityEntry>> {
        debug!("Fetching account caps");
        self.get_json(&[id, routes::CAPS], &[])
            .await
            .map_err(AccountApiError::FailedToGetCaps)
    }

    /// Provisions meters for the given products and returns the service's
    /// acknowledgement payload.
    pub async fn create_meters(
        &self,
        account: &Account,
        request: &CreateMetersRequest,
    ) -> Result<serde_json::Value> {
        debug!("Creating meters");
        self.post_json(&[&account.id, routes::METERS], request)
            .await
            .map_err(AccountApiError::FailedToCreateMeters)
    }
}

async fn parse_json_response<T>(response: reqwest::Response) -> std::result::Result<T, HttpError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(HttpError::Deserialize);
    }
    Err(error_from_response(response).await)
}

async fn parse_empty_response(response: reqwest::Response) -> std::result::Result<(), HttpError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(response).await)
}

async fn error_from_response(response: reqwest::Response) -> HttpError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(error) => HttpError::EndpointFailure { status, error },
        Err(_) => HttpError::EndpointFailureRaw { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_client(server: &mockito::ServerGuard) -> AccountApiClient {
        let base_url = format!("{}/accounts", server.url()).parse().unwrap();
        AccountApiClient::new(Config::new(base_url).unwrap()).unwrap()
    }

    fn account_json(id: &str, email: &str, sequence: u64) -> String {
        serde_json::json!({
            "id": id,
            "email": email,
            "status": "active",
            "sequence": sequence,
        })
        .to_string()
    }

    #[tokio::test]
    async fn exists_returns_true_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/accounts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("exists".into(), "true".into()),
                Matcher::UrlEncoded("email".into(), "known@test.example".into()),
            ]))
            .match_header("accept", "application/ld+json, application/json")
            .with_status(200)
            .create_async()
            .await;

        let client = test_client(&server);
        let exists = client.exists("known@test.example").await.unwrap();

        mock.assert_async().await;
        assert!(exists);
    }

    #[tokio::test]
    async fn exists_returns_false_on_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/accounts")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"type": "NotFoundError", "message": "Account does not exist."}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let exists = client.exists("dne@test.example").await.unwrap();

        assert!(!exists);
    }

    #[tokio::test]
    async fn exists_propagates_other_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/accounts")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"type": "ValidationError", "message": "Bad query."}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.exists("known@test.example").await.unwrap_err();

        assert_eq!(err.error_kind(), Some(ErrorKind::Validation));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn exists_propagates_unparseable_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/accounts")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.exists("known@test.example").await.unwrap_err();

        assert_eq!(err.status(), Some(reqwest::StatusCode::BAD_GATEWAY));
        assert_eq!(err.error_kind(), None);
    }

    #[tokio::test]
    async fn create_returns_the_new_account() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/accounts")
            .match_body(Matcher::Json(serde_json::json!({
                "email": "user@test.example",
                "authorization": "captcha-proof",
            })))
            .with_status(201)
            .with_body(account_json("acct-1", "user@test.example", 0))
            .create_async()
            .await;

        let client = test_client(&server);
        let account = client
            .create(&CreateAccountRequest {
                email: "user@test.example".to_string(),
                authorization: Some("captcha-proof".to_string()),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(account.email, "user@test.example");
        assert_eq!(account.id, "acct-1");
    }

    #[tokio::test]
    async fn create_omits_missing_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/accounts")
            .match_body(Matcher::Json(serde_json::json!({
                "email": "user@test.example",
            })))
            .with_status(201)
            .with_body(account_json("acct-1", "user@test.example", 0))
            .create_async()
            .await;

        let client = test_client(&server);
        client
            .create(&CreateAccountRequest {
                email: "user@test.example".to_string(),
                authorization: None,
            })
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_fails_without_email() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/accounts")
            .with_status(400)
            .with_body(r#"{"type": "ValidationError", "message": "email is required"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client
            .create(&CreateAccountRequest {
                email: String::new(),
                authorization: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_kind(), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn get_fetches_a_single_account() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/accounts/acct-1")
            .with_status(200)
            .with_body(account_json("acct-1", "user@test.example", 3))
            .create_async()
            .await;

        let client = test_client(&server);
        let account = client.get("acct-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(account.sequence, 3);
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn get_propagates_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/accounts/missing")
            .with_status(404)
            .with_body(r#"{"type": "NotFoundError"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.get("missing").await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_accounts_forwards_cursor_and_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/accounts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("email".into(), "user@test.example".into()),
                Matcher::UrlEncoded("after".into(), "acct-9".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                "[{}, {}]",
                account_json("acct-10", "user@test.example", 1),
                account_json("acct-11", "user@test.example", 1),
            ))
            .create_async()
            .await;

        let client = test_client(&server);
        let page = client
            .get_accounts(&AccountsQuery {
                email: Some("user@test.example".to_string()),
                after: Some("acct-9".to_string()),
                limit: Some(2),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "acct-10");
    }

    #[tokio::test]
    async fn get_accounts_applies_the_default_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/accounts")
            .match_query(Matcher::UrlEncoded("limit".into(), "10".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = test_client(&server);
        let page = client.get_accounts(&AccountsQuery::default()).await.unwrap();

        mock.assert_async().await;
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn update_posts_sequence_and_account() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/accounts/acct-1")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "sequence": 3,
                "account": {"id": "acct-1", "email": "user@test.example"},
            })))
            .with_status(204)
            .create_async()
            .await;

        let client = test_client(&server);
        let account: Account =
            serde_json::from_str(&account_json("acct-1", "user@test.example", 3)).unwrap();
        client.update(3, &account).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_with_stale_sequence_is_a_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/accounts/acct-1")
            .with_status(409)
            .with_body(r#"{"type": "InvalidStateError", "message": "sequence does not match"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let account: Account =
            serde_json::from_str(&account_json("acct-1", "user@test.example", 2)).unwrap();
        let err = client.update(2, &account).await.unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn update_patch_sends_the_json_patch_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/accounts/acct-1")
            .match_header("content-type", "application/json-patch+json")
            .match_body(Matcher::Json(serde_json::json!({
                "sequence": 4,
                "patch": [{"op": "replace", "path": "/email", "value": "new@test.example"}],
            })))
            .with_status(204)
            .create_async()
            .await;

        let client = test_client(&server);
        client
            .update_patch(
                "acct-1",
                4,
                vec![serde_json::json!({
                    "op": "replace",
                    "path": "/email",
                    "value": "new@test.example",
                })],
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn set_status_posts_to_the_status_route() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/accounts/acct-1/status")
            .match_body(Matcher::Json(serde_json::json!({"status": "disabled"})))
            .with_status(204)
            .create_async()
            .await;

        let client = test_client(&server);
        client
            .set_status("acct-1", AccountStatus::Disabled)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_roles_and_caps_hit_their_routes() {
        let mut server = mockito::Server::new_async().await;
        let roles = server
            .mock("GET", "/accounts/acct-1/roles")
            .with_status(200)
            .with_body(r#"[{"id": "role-admin", "scope": "all"}]"#)
            .create_async()
            .await;
        let caps = server
            .mock("GET", "/accounts/acct-1/caps")
            .with_status(200)
            .with_body(r#"[{"id": "cap-1"}, {"id": "cap-2"}]"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let role_entries = client.get_roles("acct-1").await.unwrap();
        let cap_entries = client.get_caps("acct-1").await.unwrap();

        roles.assert_async().await;
        caps.assert_async().await;
        assert_eq!(role_entries[0].id, "role-admin");
        assert_eq!(
            role_entries[0].extra.get("scope"),
            Some(&serde_json::json!("all"))
        );
        assert_eq!(cap_entries.len(), 2);
    }

    #[tokio::test]
    async fn create_meters_posts_under_the_account_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/accounts/acct-1/meters")
            .match_body(Matcher::Json(serde_json::json!({
                "action": "create",
                "productIds": ["product-a", "product-b"],
            })))
            .with_status(200)
            .with_body(r#"{"meters": ["meter-1", "meter-2"]}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let account: Account =
            serde_json::from_str(&account_json("acct-1", "user@test.example", 0)).unwrap();
        let ack = client
            .create_meters(
                &account,
                &CreateMetersRequest::for_products(vec![
                    "product-a".to_string(),
                    "product-b".to_string(),
                ]),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(ack["meters"][0], "meter-1");
    }

    #[tokio::test]
    async fn with_base_url_overrides_the_configured_default() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/alt-accounts/acct-1")
            .with_status(200)
            .with_body(account_json("acct-1", "user@test.example", 0))
            .create_async()
            .await;

        let client = test_client(&server);
        let alt_base = format!("{}/alt-accounts", server.url()).parse().unwrap();
        client.with_base_url(alt_base).get("acct-1").await.unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn config_rejects_urls_that_cannot_be_a_base() {
        let err = Config::new("mailto:user@test.example".parse().unwrap()).unwrap_err();
        assert!(matches!(err, AccountApiError::InvalidBaseUrl));
    }

    #[test]
    fn account_extra_fields_round_trip() {
        let body = serde_json::json!({
            "id": "acct-1",
            "email": "user@test.example",
            "status": "active",
            "sequence": 7,
            "profile": {"displayName": "User"},
        });
        let account: Account = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(
            account.extra.get("profile"),
            Some(&serde_json::json!({"displayName": "User"}))
        );
        assert_eq!(serde_json::to_value(&account).unwrap(), body);
    }
}
