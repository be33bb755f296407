use std::future::Future;

use uuid::Uuid;

use passport_core::{ImportJob, ImportRowError, Page, StagingRow, UnmappedValue};

use crate::client::PassportClient;
use crate::error::ApiError;
use crate::types::{DefinedValue, PendingEntity};

/// The bulk import procedures the review workflow depends on.
///
/// [`PassportClient`] is the production implementation. Tests drive
/// [`crate::ImportReview`] with an in-memory one.
pub trait ImportService {
    fn job_status(&self, job_id: Uuid)
        -> impl Future<Output = Result<ImportJob, ApiError>> + Send;

    fn preview(
        &self,
        job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<Page<StagingRow>, ApiError>> + Send;

    fn errors(
        &self,
        job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<Page<ImportRowError>, ApiError>> + Send;

    fn list_unmapped(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Vec<UnmappedValue>, ApiError>> + Send;

    fn map_unmapped(
        &self,
        job_id: Uuid,
        source_column: &str,
        raw_value: &str,
        entity_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn define_unmapped(
        &self,
        job_id: Uuid,
        entities: &[PendingEntity],
    ) -> impl Future<Output = Result<Vec<DefinedValue>, ApiError>> + Send;

    fn approve(&self, job_id: Uuid) -> impl Future<Output = Result<ImportJob, ApiError>> + Send;

    fn cancel(&self, job_id: Uuid) -> impl Future<Output = Result<ImportJob, ApiError>> + Send;
}

impl ImportService for PassportClient {
    async fn job_status(&self, job_id: Uuid) -> Result<ImportJob, ApiError> {
        PassportClient::job_status(self, job_id).await
    }

    async fn preview(
        &self,
        job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Page<StagingRow>, ApiError> {
        PassportClient::preview(self, job_id, page, page_size).await
    }

    async fn errors(
        &self,
        job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Page<ImportRowError>, ApiError> {
        PassportClient::errors(self, job_id, page, page_size).await
    }

    async fn list_unmapped(&self, job_id: Uuid) -> Result<Vec<UnmappedValue>, ApiError> {
        PassportClient::list_unmapped(self, job_id).await
    }

    async fn map_unmapped(
        &self,
        job_id: Uuid,
        source_column: &str,
        raw_value: &str,
        entity_id: &str,
    ) -> Result<(), ApiError> {
        PassportClient::map_unmapped(self, job_id, source_column, raw_value, entity_id).await
    }

    async fn define_unmapped(
        &self,
        job_id: Uuid,
        entities: &[PendingEntity],
    ) -> Result<Vec<DefinedValue>, ApiError> {
        PassportClient::define_unmapped(self, job_id, entities).await
    }

    async fn approve(&self, job_id: Uuid) -> Result<ImportJob, ApiError> {
        PassportClient::approve(self, job_id).await
    }

    async fn cancel(&self, job_id: Uuid) -> Result<ImportJob, ApiError> {
        PassportClient::cancel(self, job_id).await
    }
}
