use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use passport_core::{
    AppConfig, CatalogEntity, CatalogEntityKind, CatalogSnapshot, Category, ImportJob,
    ImportRowError, Page, StagingRow, UnmappedValue,
};

use crate::error::ApiError;
use crate::retry::retry_with_backoff;
use crate::types::{
    CreateEntityInput, DefineUnmappedInput, DefinedValue, EnsureCategoryInput, JobInput,
    JobPageInput, KindInput, MapUnmappedInput, NoInput, PendingEntity, RpcFailure, RpcRequest,
    RpcSuccess,
};

/// Concurrent `catalog.entities.list` calls made by [`PassportClient::fetch_snapshot`].
const SNAPSHOT_CONCURRENCY: usize = 4;

/// Header naming the brand (tenant) a call acts for.
pub const BRAND_HEADER: &str = "x-brand-id";

/// Header carrying the idempotency key on approval calls.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// HTTP client for the brand dashboard's RPC endpoint.
///
/// Use [`PassportClient::new`] with a loaded [`AppConfig`], or
/// [`PassportClient::with_base_url`] to point at a mock server in tests.
/// Transient failures (network errors, 5xx, 429) are retried with exponential
/// back-off up to `max_retries` additional attempts.
#[derive(Debug, Clone)]
pub struct PassportClient {
    client: Client,
    base_url: Url,
    token: String,
    brand_id: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PassportClient {
    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if `api_url` does not parse, or
    /// [`ApiError::Http`] if the `reqwest::Client` cannot be constructed.
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Self::with_base_url(
            &config.api_url,
            &config.api_token,
            config.request_timeout_secs,
            &config.user_agent,
        )?
        .with_retry(config.max_retries, config.retry_backoff_base_ms);
        Ok(match &config.brand_id {
            Some(brand) => client.with_brand(brand),
            None => client,
        })
    }

    /// Creates a client against `base_url` with retries disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if `base_url` does not parse, or
    /// [`ApiError::Http`] if the `reqwest::Client` cannot be constructed.
    pub fn with_base_url(
        base_url: &str,
        token: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // A trailing slash keeps any path prefix when procedure paths are joined.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ApiError::InvalidBaseUrl {
            base_url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
            brand_id: None,
            max_retries: 0,
            backoff_base_ms: 0,
        })
    }

    /// Sends `x-brand-id: {brand_id}` on every call.
    #[must_use]
    pub fn with_brand(mut self, brand_id: &str) -> Self {
        self.brand_id = Some(brand_id.to_string());
        self
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    #[must_use]
    pub fn brand_id(&self) -> Option<&str> {
        self.brand_id.as_deref()
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.call("catalog.categories.list", &NoInput {}, None).await
    }

    /// Returns the category named `name` under `parent_id`, creating it if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn ensure_category(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Category, ApiError> {
        self.call(
            "catalog.categories.ensure",
            &EnsureCategoryInput { name, parent_id },
            None,
        )
        .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn list_entities(
        &self,
        kind: CatalogEntityKind,
    ) -> Result<Vec<CatalogEntity>, ApiError> {
        self.call("catalog.entities.list", &KindInput { kind }, None).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn create_entity(
        &self,
        kind: CatalogEntityKind,
        name: &str,
    ) -> Result<CatalogEntity, ApiError> {
        self.call(
            "catalog.entities.create",
            &CreateEntityInput { kind, name },
            None,
        )
        .await
    }

    /// Assembles a [`CatalogSnapshot`] from the brand's categories and every
    /// non-category entity kind.
    ///
    /// # Errors
    ///
    /// Returns the first [`ApiError`] from any of the list calls.
    pub async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, ApiError> {
        let categories = self.list_categories().await?;

        let kinds = CatalogEntityKind::ALL
            .into_iter()
            .filter(|kind| *kind != CatalogEntityKind::Category);
        let mut entities: Vec<CatalogEntity> = stream::iter(kinds)
            .map(|kind| self.list_entities(kind))
            .buffer_unordered(SNAPSHOT_CONCURRENCY)
            .try_concat()
            .await?;
        entities.sort_by(|a, b| (a.kind.as_str(), &a.name).cmp(&(b.kind.as_str(), &b.name)));

        tracing::info!(
            categories = categories.len(),
            entities = entities.len(),
            "fetched catalog snapshot"
        );
        Ok(CatalogSnapshot {
            categories,
            entities,
        })
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn job_status(&self, job_id: Uuid) -> Result<ImportJob, ApiError> {
        self.call("bulkImport.status", &JobInput { job_id }, None).await
    }

    /// One page of staging rows. `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn preview(
        &self,
        job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Page<StagingRow>, ApiError> {
        self.call(
            "bulkImport.preview",
            &JobPageInput {
                job_id,
                page,
                page_size,
            },
            None,
        )
        .await
    }

    /// One page of row errors. `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn errors(
        &self,
        job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Page<ImportRowError>, ApiError> {
        self.call(
            "bulkImport.errors",
            &JobPageInput {
                job_id,
                page,
                page_size,
            },
            None,
        )
        .await
    }

    /// Fetches every page of a job's row errors, in row order.
    ///
    /// Stops at the last page or at the first empty page, whichever comes
    /// first.
    ///
    /// # Errors
    ///
    /// Returns the first [`ApiError`] from a page call.
    pub async fn all_errors(
        &self,
        job_id: Uuid,
        page_size: u32,
    ) -> Result<Vec<ImportRowError>, ApiError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let errors = self.errors(job_id, page, page_size).await?;
            let done = errors.items.is_empty() || !errors.has_next();
            all.extend(errors.items);
            if done {
                break;
            }
            page += 1;
        }
        tracing::debug!(%job_id, pages = page, errors = all.len(), "fetched row errors");
        Ok(all)
    }

    /// Commits the job's valid rows to the catalog.
    ///
    /// A fresh idempotency key is generated per call and reused across its
    /// retries, so a retried approval is applied at most once.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn approve(&self, job_id: Uuid) -> Result<ImportJob, ApiError> {
        let key = Uuid::new_v4();
        tracing::info!(%job_id, idempotency_key = %key, "approving import job");
        self.call("bulkImport.approve", &JobInput { job_id }, Some(key)).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn cancel(&self, job_id: Uuid) -> Result<ImportJob, ApiError> {
        tracing::info!(%job_id, "cancelling import job");
        self.call("bulkImport.cancel", &JobInput { job_id }, None).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn list_unmapped(&self, job_id: Uuid) -> Result<Vec<UnmappedValue>, ApiError> {
        self.call("bulkImport.unmapped.list", &JobInput { job_id }, None).await
    }

    /// Links one unmapped value to an existing catalog entity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn map_unmapped(
        &self,
        job_id: Uuid,
        source_column: &str,
        raw_value: &str,
        entity_id: &str,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .call(
                "bulkImport.unmapped.map",
                &MapUnmappedInput {
                    job_id,
                    source_column,
                    raw_value,
                    entity_id,
                },
                None,
            )
            .await?;
        Ok(())
    }

    /// Creates catalog entities for a batch of unmapped values.
    ///
    /// The service answers with the values it defined; any value missing from
    /// the answer was not created.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn define_unmapped(
        &self,
        job_id: Uuid,
        entities: &[PendingEntity],
    ) -> Result<Vec<DefinedValue>, ApiError> {
        self.call(
            "bulkImport.unmapped.batchDefine",
            &DefineUnmappedInput { job_id, entities },
            None,
        )
        .await
    }

    pub(crate) fn procedure_url(&self, procedure: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(&format!("rpc/{procedure}"))
            .map_err(|e| ApiError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn call<I, O>(
        &self,
        procedure: &str,
        input: &I,
        idempotency_key: Option<Uuid>,
    ) -> Result<O, ApiError>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        let url = self.procedure_url(procedure)?;
        tracing::debug!(procedure, "rpc call");

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let mut request = self
                    .client
                    .post(url)
                    .bearer_auth(&self.token)
                    .json(&RpcRequest { input });
                if let Some(brand) = &self.brand_id {
                    request = request.header(BRAND_HEADER, brand);
                }
                if let Some(key) = idempotency_key {
                    request = request.header(IDEMPOTENCY_HEADER, key.to_string());
                }

                let response = request.send().await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(ApiError::RateLimited { retry_after_secs });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ApiError::NotFound {
                        procedure: procedure.to_owned(),
                    });
                }

                let body = response.text().await?;

                // 5xx stays a status error so it is retried even with an envelope.
                if !status.is_server_error() {
                    if let Ok(RpcFailure { error }) = serde_json::from_str::<RpcFailure>(&body) {
                        return Err(ApiError::Rpc {
                            procedure: procedure.to_owned(),
                            code: error.code,
                            message: error.message,
                        });
                    }
                }

                if !status.is_success() {
                    return Err(ApiError::UnexpectedStatus {
                        status: status.as_u16(),
                        procedure: procedure.to_owned(),
                    });
                }

                serde_json::from_str::<RpcSuccess<O>>(&body)
                    .map(|envelope| envelope.result.data)
                    .map_err(|source| ApiError::Deserialize {
                        context: procedure.to_owned(),
                        source,
                    })
            }
        })
        .await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
