//! Client side of the hosted backend: PostgREST tables, GoTrue auth,
//! object storage and RPC procedures.
//!
//! Handlers and repos only see the [`Backend`] trait. [`RestBackend`] talks
//! HTTP; the integration tests swap in an in-memory implementation.

pub mod error;
pub mod query;
pub mod rest;
pub mod rpc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::AppError;

pub use error::BackendError;
pub use query::{Filter, TableQuery};
pub use rest::RestBackend;

/// Bearer token the backend evaluates row-level policies against.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// The auth user as GoTrue reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until `access_token` expires.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    pub user: AuthUser,
}

fn default_expires_in() -> i64 {
    3600
}

/// Result of a sign-up. `session` is absent when the project requires email
/// confirmation before the first sign-in.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

/// An object listed from a storage bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredObject {
    pub name: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    // -- auth --
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError>;
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<SignUp, BackendError>;
    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError>;
    /// `Ok(None)` when the token is expired or revoked.
    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>, BackendError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError>;
    async fn reset_password_email(&self, email: &str, redirect_to: &str)
        -> Result<(), BackendError>;

    // -- tables --
    async fn select(&self, token: &AccessToken, query: &TableQuery)
        -> Result<Vec<Value>, BackendError>;
    async fn insert(
        &self,
        token: &AccessToken,
        table: &str,
        rows: Value,
    ) -> Result<Vec<Value>, BackendError>;
    async fn update(
        &self,
        token: &AccessToken,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;
    async fn delete(
        &self,
        token: &AccessToken,
        table: &str,
        filters: &[Filter],
    ) -> Result<(), BackendError>;

    // -- storage --
    async fn upload(
        &self,
        token: &AccessToken,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> Result<(), BackendError>;
    async fn list(
        &self,
        token: &AccessToken,
        bucket: &str,
        prefix: &str,
        search: Option<&str>,
    ) -> Result<Vec<StoredObject>, BackendError>;
    async fn remove(
        &self,
        token: &AccessToken,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), BackendError>;
    fn public_url(&self, bucket: &str, path: &str) -> String;

    // -- procedures --
    async fn rpc(&self, token: &AccessToken, name: &str, args: Value)
        -> Result<Value, BackendError>;

    /// Cheap liveness probe used by `/health`.
    async fn health(&self) -> Result<(), BackendError>;
}

/// A backend handle bound to one caller's token. Repos take this the way
/// they would take a connection pool.
#[derive(Clone, Copy)]
pub struct Conn<'a> {
    pub backend: &'a dyn Backend,
    pub token: &'a AccessToken,
}

impl<'a> Conn<'a> {
    pub fn new(backend: &'a dyn Backend, token: &'a AccessToken) -> Self {
        Self { backend, token }
    }

    pub async fn fetch<T: DeserializeOwned>(&self, query: &TableQuery) -> Result<Vec<T>, AppError> {
        let rows = self.backend.select(self.token, query).await?;
        decode_rows(query.table(), rows)
    }

    pub async fn fetch_optional<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
    ) -> Result<Option<T>, AppError> {
        let query = query.clone().limit(1);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    pub async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        rows: Value,
    ) -> Result<Vec<T>, AppError> {
        let rows = self.backend.insert(self.token, table, rows).await?;
        decode_rows(table, rows)
    }

    pub async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<T>, AppError> {
        let rows = self.backend.update(self.token, table, filters, patch).await?;
        decode_rows(table, rows)
    }

    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), AppError> {
        self.backend.delete(self.token, table, filters).await?;
        Ok(())
    }
}

/// Decode raw rows, reporting a shape mismatch as an upstream failure.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>, AppError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                tracing::error!(table, error = %e, "Unexpected row shape");
                AppError::upstream(format!("Respuesta inesperada del servidor: {e}"))
            })
        })
        .collect()
}
