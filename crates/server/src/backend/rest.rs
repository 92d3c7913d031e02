use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};

use super::query::{filter_params, Filter, TableQuery};
use super::{AccessToken, AuthSession, AuthUser, Backend, BackendError, SignUp, StoredObject};
use crate::config::PortalConfig;

/// [`Backend`] over the hosted project's HTTP APIs.
#[derive(Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestBackend {
    pub fn new(config: &PortalConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(config.backend_timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: config.backend_url.clone(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Every request carries the project key; the bearer is the caller's
    /// token, or the anon key for anonymous auth calls.
    fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let bearer = token.map(AccessToken::as_str).unwrap_or(&self.anon_key);
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn table(&self, method: Method, table: &str, token: &AccessToken) -> RequestBuilder {
        self.request(method, &format!("/rest/v1/{table}"), Some(token))
    }

    fn storage(&self, method: Method, path: &str, token: &AccessToken) -> RequestBuilder {
        self.request(method, &format!("/storage/v1/{path}"), Some(token))
    }
}

/// Send and return the JSON body, `Null` when the body is empty.
async fn send(req: RequestBuilder) -> Result<Value, BackendError> {
    let response = req.send().await.map_err(BackendError::from)?;
    read_body(response).await
}

async fn read_body(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let body = response.text().await.map_err(BackendError::from)?;
    if !status.is_success() {
        return Err(BackendError::from_body(status.as_u16(), &body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| BackendError::new(status.as_u16(), format!("Invalid JSON from backend: {e}")))
}

fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, BackendError> {
    serde_json::from_value(value)
        .map_err(|e| BackendError::new(200, format!("Unexpected auth response: {e}")))
}

#[async_trait]
impl Backend for RestBackend {
    #[tracing::instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let body = send(
            self.request(Method::POST, "/auth/v1/token", None)
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;
        parse(body)
    }

    #[tracing::instrument(skip(self, password, metadata))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<SignUp, BackendError> {
        let body = send(
            self.request(Method::POST, "/auth/v1/signup", None)
                .json(&json!({ "email": email, "password": password, "data": metadata })),
        )
        .await?;
        // With auto-confirm the response is a full session, otherwise the bare user.
        if body.get("access_token").is_some() {
            let session: AuthSession = parse(body)?;
            Ok(SignUp {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user = body.get("user").cloned().unwrap_or(body);
            Ok(SignUp {
                user: parse(user)?,
                session: None,
            })
        }
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError> {
        send(self.request(Method::POST, "/auth/v1/logout", Some(token))).await?;
        Ok(())
    }

    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>, BackendError> {
        match send(self.request(Method::GET, "/auth/v1/user", Some(token))).await {
            Ok(body) => Ok(Some(parse(body)?)),
            Err(e) if e.status == 401 || e.status == 403 => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let body = send(
            self.request(Method::POST, "/auth/v1/token", None)
                .query(&[("grant_type", "refresh_token")])
                .json(&json!({ "refresh_token": refresh_token })),
        )
        .await?;
        parse(body)
    }

    #[tracing::instrument(skip(self))]
    async fn reset_password_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        send(
            self.request(Method::POST, "/auth/v1/recover", None)
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, token), fields(table = query.table()))]
    async fn select(
        &self,
        token: &AccessToken,
        query: &TableQuery,
    ) -> Result<Vec<Value>, BackendError> {
        let body = send(
            self.table(Method::GET, query.table(), token)
                .query(&query.to_params()),
        )
        .await?;
        Ok(into_rows(body))
    }

    #[tracing::instrument(skip(self, token, rows))]
    async fn insert(
        &self,
        token: &AccessToken,
        table: &str,
        rows: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let body = send(
            self.table(Method::POST, table, token)
                .header("Prefer", "return=representation")
                .json(&rows),
        )
        .await?;
        Ok(into_rows(body))
    }

    #[tracing::instrument(skip(self, token, patch))]
    async fn update(
        &self,
        token: &AccessToken,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let body = send(
            self.table(Method::PATCH, table, token)
                .query(&filter_params(filters))
                .header("Prefer", "return=representation")
                .json(&patch),
        )
        .await?;
        Ok(into_rows(body))
    }

    #[tracing::instrument(skip(self, token))]
    async fn delete(
        &self,
        token: &AccessToken,
        table: &str,
        filters: &[Filter],
    ) -> Result<(), BackendError> {
        send(
            self.table(Method::DELETE, table, token)
                .query(&filter_params(filters)),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, token, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        token: &AccessToken,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> Result<(), BackendError> {
        send(
            self.storage(Method::POST, &format!("object/{bucket}/{path}"), token)
                .header("Content-Type", content_type)
                .header("x-upsert", if upsert { "true" } else { "false" })
                .body(bytes),
        )
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        token: &AccessToken,
        bucket: &str,
        prefix: &str,
        search: Option<&str>,
    ) -> Result<Vec<StoredObject>, BackendError> {
        let mut body = json!({ "prefix": prefix, "limit": 100, "offset": 0 });
        if let Some(search) = search {
            body["search"] = Value::String(search.to_string());
        }
        let rows = send(
            self.storage(Method::POST, &format!("object/list/{bucket}"), token)
                .json(&body),
        )
        .await?;
        into_rows(rows).into_iter().map(parse).collect()
    }

    async fn remove(
        &self,
        token: &AccessToken,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), BackendError> {
        if paths.is_empty() {
            return Ok(());
        }
        send(
            self.storage(Method::DELETE, &format!("object/{bucket}"), token)
                .json(&json!({ "prefixes": paths })),
        )
        .await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!("/storage/v1/object/public/{bucket}/{path}"))
    }

    #[tracing::instrument(skip(self, token, args))]
    async fn rpc(&self, token: &AccessToken, name: &str, args: Value) -> Result<Value, BackendError> {
        send(
            self.request(Method::POST, &format!("/rest/v1/rpc/{name}"), Some(token))
                .json(&args),
        )
        .await
    }

    async fn health(&self) -> Result<(), BackendError> {
        send(self.request(Method::GET, "/auth/v1/health", None)).await?;
        Ok(())
    }
}
