//! Client for the hosted backend-as-a-service.
//!
//! Table access follows the REST conventions of the vendor's `/rest/v1`
//! gateway: filters are query parameters of the form `column=op.value`,
//! writes ask for `return=representation` so callers get the stored rows back.
//! Auth calls live in [`auth`].

use std::fmt::Display;

use reqwest::{header, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ServiceError, ServiceResult};

pub mod auth;

pub use auth::SignUpOutcome;

// ---

/// Query string for a table request.
#[derive(Debug, Default, Clone)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lte", value)
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        // ---
        let dir = if ascending { "asc" } else { "desc" };
        self.params.push(("order".into(), format!("{}.{}", column, dir)));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.params.push(("limit".into(), n.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn filter(mut self, column: &str, op: &str, value: impl Display) -> Self {
        self.params.push((column.into(), format!("{}.{}", op, value)));
        self
    }
}

/// Thin typed wrapper around the vendor's REST and auth endpoints.
#[derive(Debug, Clone)]
pub struct BaasClient {
    // ---
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
}

impl BaasClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        anon_key: &str,
        service_key: Option<String>,
    ) -> Self {
        // ---
        BaasClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_key,
        }
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Service-role key for requests that must bypass row-level security.
    pub fn service_key(&self) -> ServiceResult<&str> {
        self.service_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("BAAS_SERVICE_KEY"))
    }

    /// Build a request against `path` carrying the project key and `token`.
    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        // ---
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    fn table(&self, method: Method, table: &str, token: &str) -> RequestBuilder {
        self.request(method, &format!("/rest/v1/{}", table), token)
    }

    /// Probe the auth service health endpoint.
    pub async fn ping(&self) -> ServiceResult<()> {
        // ---
        let req = self
            .http
            .get(format!("{}/auth/v1/health", self.base_url))
            .header("apikey", &self.anon_key);
        send_empty(req).await
    }

    /// Fetch rows of `table` matching `query`.
    pub async fn select<T: DeserializeOwned>(
        &self,
        token: &str,
        table: &str,
        query: &Query,
    ) -> ServiceResult<Vec<T>> {
        // ---
        tracing::debug!("BaaS select {} {:?}", table, query.params());
        let req = self.table(Method::GET, table, token).query(query.params());
        send_json(req).await
    }

    /// Insert `body` (one row or an array of rows) and return the stored rows.
    pub async fn insert<B, T>(&self, token: &str, table: &str, body: &B) -> ServiceResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // ---
        tracing::debug!("BaaS insert into {}", table);
        let req = self
            .table(Method::POST, table, token)
            .header("Prefer", "return=representation")
            .json(body);
        send_json(req).await
    }

    /// Insert or merge on the unique columns listed in `on_conflict`.
    pub async fn upsert<B, T>(
        &self,
        token: &str,
        table: &str,
        on_conflict: &str,
        body: &B,
    ) -> ServiceResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // ---
        tracing::debug!("BaaS upsert into {} on ({})", table, on_conflict);
        let req = self
            .table(Method::POST, table, token)
            .query(&[("on_conflict", on_conflict)])
            .header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            )
            .json(body);
        send_json(req).await
    }

    /// Patch every row matching `filters` and return the updated rows.
    pub async fn update<B, T>(
        &self,
        token: &str,
        table: &str,
        filters: &Query,
        body: &B,
    ) -> ServiceResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // ---
        tracing::debug!("BaaS update {} {:?}", table, filters.params());
        let req = self
            .table(Method::PATCH, table, token)
            .query(filters.params())
            .header("Prefer", "return=representation")
            .json(body);
        send_json(req).await
    }

    /// Delete every row matching `filters`.
    pub async fn delete(&self, token: &str, table: &str, filters: &Query) -> ServiceResult<()> {
        // ---
        tracing::debug!("BaaS delete from {} {:?}", table, filters.params());
        let req = self
            .table(Method::DELETE, table, token)
            .query(filters.params())
            .header("Prefer", "return=minimal");
        send_empty(req).await
    }
}

/// Send `req`, turn non-2xx answers into [`ServiceError::Upstream`], decode JSON.
async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> ServiceResult<T> {
    // ---
    let resp = req.header(header::ACCEPT, "application/json").send().await?;
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(ServiceError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

async fn send_empty(req: RequestBuilder) -> ServiceResult<()> {
    // ---
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ServiceError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_query_encodes_filters() {
        // ---
        let q = Query::new()
            .select("*")
            .eq("device_id", "abc")
            .gte("created_at", "2025-01-01T00:00:00Z")
            .order("created_at", false)
            .limit(1);

        let params: Vec<(&str, &str)> = q
            .params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        assert_eq!(
            params,
            vec![
                ("select", "*"),
                ("device_id", "eq.abc"),
                ("created_at", "gte.2025-01-01T00:00:00Z"),
                ("order", "created_at.desc"),
                ("limit", "1"),
            ]
        );
    }

    #[test]
    fn test_service_key_required() {
        // ---
        let client = BaasClient::new(reqwest::Client::new(), "http://localhost/", "anon", None);
        assert!(matches!(
            client.service_key(),
            Err(ServiceError::NotConfigured(_))
        ));

        let client = BaasClient::new(
            reqwest::Client::new(),
            "http://localhost",
            "anon",
            Some("service".into()),
        );
        assert_eq!(client.service_key().unwrap(), "service");
        assert_eq!(client.base_url, "http://localhost");
    }
}
