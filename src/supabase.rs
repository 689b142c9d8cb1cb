use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::store::{StoreError, StoreResult};

/// Thin PostgREST client for the hosted Supabase project.
///
/// Every call authenticates with the service-role key; row-level security is
/// the backend's business, not ours.
#[derive(Clone)]
pub struct SupabaseManager {
    client: Client,
    supabase_url: String,
    service_role_key: String,
}

impl SupabaseManager {
    pub fn new(supabase_url: &str, service_role_key: &str, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Backend(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            client,
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, table)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
    }

    /// GET /rest/v1/{table}?{filters}
    ///
    /// Filters use PostgREST syntax, e.g. `("group_id", "eq.<uuid>")`.
    pub async fn select<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> StoreResult<Vec<T>> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        query.extend(filters.iter().cloned());

        let response = self
            .authed(self.client.get(self.table_url(table)))
            .query(&query)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Supabase request failed ({}): {}", table, e)))?;

        let response = check(table, response).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", table, e)))
    }

    /// Single-row convenience over [`select`](Self::select)
    pub async fn select_one<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> StoreResult<Option<T>> {
        let mut rows: Vec<T> = self.select(table, filters).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    /// POST /rest/v1/{table} (bulk insert)
    pub async fn insert<T: Serialize>(&self, table: &str, rows: &[T]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Supabase insert failed ({}): {}", table, e)))?;

        check(table, response).await.map(|_| ())
    }

    /// POST /rest/v1/{table}?on_conflict=... with merge-duplicates (UPSERT)
    pub async fn upsert<T: Serialize>(&self, table: &str, rows: &[T], on_conflict: &str) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Supabase upsert failed ({}): {}", table, e)))?;

        check(table, response).await.map(|_| ())
    }

    /// POST with `on_conflict` + ignore-duplicates; returns how many rows were
    /// actually inserted (0 when every row already existed)
    pub async fn insert_ignoring_duplicates<T: Serialize>(
        &self,
        table: &str,
        rows: &[T],
        on_conflict: &str,
    ) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Supabase insert failed ({}): {}", table, e)))?;

        let inserted: Vec<Value> = check(table, response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", table, e)))?;
        Ok(inserted.len())
    }

    /// DELETE /rest/v1/{table}?{filters}
    pub async fn delete(&self, table: &str, filters: &[(&str, String)]) -> StoreResult<()> {
        let response = self
            .authed(self.client.delete(self.table_url(table)))
            .query(filters)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Supabase delete failed ({}): {}", table, e)))?;

        check(table, response).await.map(|_| ())
    }

    /// PATCH /rest/v1/{table}?{filters}; returns the number of rows touched
    pub async fn update(&self, table: &str, filters: &[(&str, String)], patch: &Value) -> StoreResult<usize> {
        let response = self
            .authed(self.client.patch(self.table_url(table)))
            .query(filters)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Supabase update failed ({}): {}", table, e)))?;

        let rows: Vec<Value> = check(table, response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", table, e)))?;
        Ok(rows.len())
    }

    /// POST /rest/v1/rpc/{function}
    pub async fn rpc(&self, function: &str, args: &Value) -> StoreResult<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.supabase_url, function);
        debug!("Supabase RPC {} {}", function, args);

        let response = self
            .authed(self.client.post(&url))
            .json(args)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Supabase RPC failed ({}): {}", function, e)))?;

        let response = check(function, response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", function, e)))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Decode(format!("{}: {}", function, e)))
    }
}

async fn check(what: &str, response: Response) -> StoreResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("Supabase error ({}): {} - {}", what, status, body);
    Err(StoreError::Backend(format!("{}: {} - {}", what, status, body)))
}

/// PostgREST `in.(...)` filter value
pub fn in_list<T: ToString>(values: &[T]) -> String {
    let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("in.({})", joined.join(","))
}

pub fn eq<T: ToString>(value: T) -> String {
    format!("eq.{}", value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_helpers() {
        assert_eq!(eq(42), "eq.42");
        assert_eq!(in_list(&["a", "b"]), "in.(a,b)");
    }

    #[test]
    fn test_url_trailing_slash_trimmed() {
        let manager = SupabaseManager::new("https://demo.supabase.co/", "key", Duration::from_secs(1)).unwrap();
        assert_eq!(manager.table_url("fixtures"), "https://demo.supabase.co/rest/v1/fixtures");
    }
}
