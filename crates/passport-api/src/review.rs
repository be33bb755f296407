//! Review of a validated bulk import job before it is committed.
//!
//! An [`ImportReview`] holds the current preview and error pages, the job's
//! unmapped values and the user's pending choice for each of them. Nothing is
//! sent to the service until [`ImportReview::commit`], which runs in two
//! phases:
//!
//! 1. Apply every mapping and create every new entity. Values that succeed are
//!    marked defined; failed ones keep their selection so commit can be retried.
//! 2. Approve the job, only if phase 1 fully succeeded.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use uuid::Uuid;

use passport_core::{
    CategoryReconciler, ImportJob, ImportJobStatus, ImportRowError, Page, StagingRow,
    UnmappedValue,
};

use crate::error::ApiError;
use crate::service::ImportService;
use crate::types::PendingEntity;

/// Concurrent `bulkImport.unmapped.map` calls during commit.
const MAP_CONCURRENCY: usize = 4;

const CATEGORY_COLUMN: &str = "category_name";

/// What the user chose for one unmapped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Link the value to an existing catalog entity.
    Map { entity_id: String },
    /// Create a new catalog entity named `name` for the value.
    Create { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    Reviewing,
    Committed,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("import job {job_id} is {status} and can no longer be changed")]
    JobClosed {
        job_id: Uuid,
        status: ImportJobStatus,
    },

    #[error("import job {job_id} is still {status}; wait for validation to finish")]
    NotReady {
        job_id: Uuid,
        status: ImportJobStatus,
    },

    #[error("no unmapped value '{raw_value}' in column {source_column}")]
    UnknownValue {
        source_column: String,
        raw_value: String,
    },

    #[error("{count} unmapped value(s) still need a mapping or a new entity")]
    Unresolved { count: usize },

    #[error("{failed} of {attempted} unmapped value(s) could not be defined; the job was not approved")]
    DefinitionFailed { failed: usize, attempted: usize },
}

type ValueKey = (String, String);

fn value_key(source_column: &str, raw_value: &str) -> ValueKey {
    (source_column.to_string(), raw_value.to_string())
}

/// Review session for one import job.
#[derive(Debug)]
pub struct ImportReview<'s, S> {
    service: &'s S,
    job: ImportJob,
    page_size: u32,
    preview: Page<StagingRow>,
    errors: Page<ImportRowError>,
    unmapped: Vec<UnmappedValue>,
    resolutions: BTreeMap<ValueKey, Resolution>,
    stage: ReviewStage,
}

impl<'s, S: ImportService> ImportReview<'s, S> {
    /// Fetches the job, the first preview and error pages and the unmapped
    /// values.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::JobClosed`] if the job is completed, failed or cancelled.
    /// - [`ReviewError::NotReady`] if the job has not finished validating.
    /// - [`ReviewError::Api`] if any call fails.
    pub async fn load(service: &'s S, job_id: Uuid, page_size: u32) -> Result<Self, ReviewError> {
        let job = service.job_status(job_id).await?;
        if job.status.is_terminal() {
            return Err(ReviewError::JobClosed {
                job_id,
                status: job.status,
            });
        }
        if !job.status.is_reviewable() {
            return Err(ReviewError::NotReady {
                job_id,
                status: job.status,
            });
        }

        let (preview, errors, unmapped) = futures::try_join!(
            service.preview(job_id, 1, page_size),
            service.errors(job_id, 1, page_size),
            service.list_unmapped(job_id),
        )?;

        tracing::info!(
            %job_id,
            total_rows = job.total_rows,
            error_rows = job.error_rows,
            unmapped = unmapped.len(),
            "loaded import job for review"
        );

        Ok(Self {
            service,
            job,
            page_size,
            preview,
            errors,
            unmapped,
            resolutions: BTreeMap::new(),
            stage: ReviewStage::Reviewing,
        })
    }

    #[must_use]
    pub fn job(&self) -> &ImportJob {
        &self.job
    }

    #[must_use]
    pub fn stage(&self) -> ReviewStage {
        self.stage
    }

    #[must_use]
    pub fn preview(&self) -> &Page<StagingRow> {
        &self.preview
    }

    #[must_use]
    pub fn errors(&self) -> &Page<ImportRowError> {
        &self.errors
    }

    #[must_use]
    pub fn unmapped(&self) -> &[UnmappedValue] {
        &self.unmapped
    }

    #[must_use]
    pub fn resolution(&self, source_column: &str, raw_value: &str) -> Option<&Resolution> {
        self.resolutions.get(&value_key(source_column, raw_value))
    }

    /// Values that are neither defined nor have a pending resolution.
    #[must_use]
    pub fn unresolved(&self) -> Vec<&UnmappedValue> {
        self.unmapped
            .iter()
            .filter(|v| {
                !v.is_defined
                    && !self
                        .resolutions
                        .contains_key(&value_key(&v.source_column, &v.raw_value))
            })
            .collect()
    }

    /// Loads the next page of staging rows. Returns `false` on the last page.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Api`] if the call fails.
    pub async fn next_preview_page(&mut self) -> Result<bool, ReviewError> {
        if !self.preview.has_next() {
            return Ok(false);
        }
        self.preview = self
            .service
            .preview(self.job.id, self.preview.page + 1, self.page_size)
            .await?;
        Ok(true)
    }

    /// Loads the next page of row errors. Returns `false` on the last page.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Api`] if the call fails.
    pub async fn next_error_page(&mut self) -> Result<bool, ReviewError> {
        if !self.errors.has_next() {
            return Ok(false);
        }
        self.errors = self
            .service
            .errors(self.job.id, self.errors.page + 1, self.page_size)
            .await?;
        Ok(true)
    }

    /// Selects an existing catalog entity for an unmapped value.
    ///
    /// # Errors
    ///
    /// [`ReviewError::JobClosed`] after commit or cancel, or
    /// [`ReviewError::UnknownValue`] if the pair is not an open unmapped value.
    pub fn map_value(
        &mut self,
        source_column: &str,
        raw_value: &str,
        entity_id: &str,
    ) -> Result<(), ReviewError> {
        self.set_resolution(
            source_column,
            raw_value,
            Resolution::Map {
                entity_id: entity_id.to_string(),
            },
        )
    }

    /// Marks an unmapped value to be created as a new catalog entity.
    ///
    /// # Errors
    ///
    /// Same as [`ImportReview::map_value`].
    pub fn create_value(
        &mut self,
        source_column: &str,
        raw_value: &str,
        name: &str,
    ) -> Result<(), ReviewError> {
        self.set_resolution(
            source_column,
            raw_value,
            Resolution::Create {
                name: name.trim().to_string(),
            },
        )
    }

    /// Drops the pending choice for a value. Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// [`ReviewError::JobClosed`] after commit or cancel.
    pub fn clear_resolution(
        &mut self,
        source_column: &str,
        raw_value: &str,
    ) -> Result<bool, ReviewError> {
        self.ensure_open()?;
        Ok(self
            .resolutions
            .remove(&value_key(source_column, raw_value))
            .is_some())
    }

    /// Proposes a mapping for every unresolved category value the reconciler
    /// can match. Returns how many were proposed.
    ///
    /// # Errors
    ///
    /// [`ReviewError::JobClosed`] after commit or cancel.
    pub fn auto_resolve_categories(
        &mut self,
        reconciler: &CategoryReconciler,
    ) -> Result<usize, ReviewError> {
        self.ensure_open()?;
        let proposals: Vec<(ValueKey, String)> = self
            .unresolved()
            .into_iter()
            .filter(|v| v.source_column == CATEGORY_COLUMN)
            .filter_map(|v| {
                reconciler.resolve(&v.raw_value).map(|m| {
                    tracing::debug!(
                        raw_value = %v.raw_value,
                        category = %m.name,
                        kind = ?m.kind,
                        "proposed category mapping"
                    );
                    (value_key(&v.source_column, &v.raw_value), m.id)
                })
            })
            .collect();

        let count = proposals.len();
        for (key, entity_id) in proposals {
            self.resolutions.insert(key, Resolution::Map { entity_id });
        }
        Ok(count)
    }

    /// Marks every unresolved value to be created under its trimmed raw text.
    /// Returns how many were marked.
    ///
    /// # Errors
    ///
    /// [`ReviewError::JobClosed`] after commit or cancel.
    pub fn create_all_unresolved(&mut self) -> Result<usize, ReviewError> {
        self.ensure_open()?;
        let keys: Vec<(ValueKey, String)> = self
            .unresolved()
            .into_iter()
            .map(|v| {
                (
                    value_key(&v.source_column, &v.raw_value),
                    v.raw_value.trim().to_string(),
                )
            })
            .collect();
        let count = keys.len();
        for (key, name) in keys {
            self.resolutions.insert(key, Resolution::Create { name });
        }
        Ok(count)
    }

    /// Applies every pending resolution, then approves the job.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::JobClosed`] after commit or cancel.
    /// - [`ReviewError::Unresolved`] if any value has no resolution; nothing is sent.
    /// - [`ReviewError::DefinitionFailed`] if any mapping or creation failed;
    ///   the job is not approved and failed selections are kept.
    /// - [`ReviewError::Api`] if approval fails.
    pub async fn commit(&mut self) -> Result<ImportJob, ReviewError> {
        self.ensure_open()?;
        let unresolved = self.unresolved().len();
        if unresolved > 0 {
            return Err(ReviewError::Unresolved { count: unresolved });
        }

        let job_id = self.job.id;
        let (mappings, creations) = self.pending_work();
        let attempted = mappings.len() + creations.len();
        let mut failed = 0usize;

        let service = self.service;
        let mapped: Vec<(ValueKey, Result<(), ApiError>)> = stream::iter(mappings)
            .map(|(key, entity_id)| async move {
                let result = service
                    .map_unmapped(job_id, &key.0, &key.1, &entity_id)
                    .await;
                (key, result)
            })
            .buffer_unordered(MAP_CONCURRENCY)
            .collect()
            .await;
        for (key, result) in mapped {
            match result {
                Ok(()) => self.mark_defined(&key),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        source_column = %key.0,
                        raw_value = %key.1,
                        error = %e,
                        "mapping unmapped value failed"
                    );
                }
            }
        }

        if !creations.is_empty() {
            match service.define_unmapped(job_id, &creations).await {
                Ok(defined) => {
                    let mut created = 0usize;
                    for value in defined {
                        let key = value_key(&value.source_column, &value.raw_value);
                        if self.resolutions.contains_key(&key) {
                            self.mark_defined(&key);
                            created += 1;
                        }
                    }
                    failed += creations.len().saturating_sub(created);
                }
                Err(e) => {
                    failed += creations.len();
                    tracing::warn!(count = creations.len(), error = %e, "batch define failed");
                }
            }
        }

        if failed > 0 {
            return Err(ReviewError::DefinitionFailed { failed, attempted });
        }

        if self.job.error_rows > 0 {
            tracing::warn!(
                %job_id,
                error_rows = self.job.error_rows,
                "approving job; rows with errors will be skipped"
            );
        }
        let job = service.approve(job_id).await?;
        tracing::info!(%job_id, status = %job.status, "import job approved");

        self.job = job.clone();
        self.unmapped.clear();
        self.resolutions.clear();
        self.stage = ReviewStage::Committed;
        Ok(job)
    }

    /// Cancels the job and discards its unmapped values.
    ///
    /// # Errors
    ///
    /// [`ReviewError::JobClosed`] after commit or cancel, or
    /// [`ReviewError::Api`] if the call fails.
    pub async fn cancel(&mut self) -> Result<ImportJob, ReviewError> {
        self.ensure_open()?;
        let job = self.service.cancel(self.job.id).await?;
        self.job = job.clone();
        self.unmapped.clear();
        self.resolutions.clear();
        self.stage = ReviewStage::Cancelled;
        Ok(job)
    }

    fn ensure_open(&self) -> Result<(), ReviewError> {
        match self.stage {
            ReviewStage::Reviewing => Ok(()),
            ReviewStage::Committed | ReviewStage::Cancelled => Err(ReviewError::JobClosed {
                job_id: self.job.id,
                status: self.job.status,
            }),
        }
    }

    fn set_resolution(
        &mut self,
        source_column: &str,
        raw_value: &str,
        resolution: Resolution,
    ) -> Result<(), ReviewError> {
        self.ensure_open()?;
        let open = self
            .unmapped
            .iter()
            .any(|v| !v.is_defined && v.key() == (source_column, raw_value));
        if !open {
            return Err(ReviewError::UnknownValue {
                source_column: source_column.to_string(),
                raw_value: raw_value.to_string(),
            });
        }
        self.resolutions
            .insert(value_key(source_column, raw_value), resolution);
        Ok(())
    }

    /// Splits pending resolutions of still-undefined values into mappings and
    /// creations.
    fn pending_work(&self) -> (Vec<(ValueKey, String)>, Vec<PendingEntity>) {
        let mut mappings = Vec::new();
        let mut creations = Vec::new();
        for value in self.unmapped.iter().filter(|v| !v.is_defined) {
            let key = value_key(&value.source_column, &value.raw_value);
            match self.resolutions.get(&key) {
                Some(Resolution::Map { entity_id }) => mappings.push((key, entity_id.clone())),
                Some(Resolution::Create { name }) => creations.push(PendingEntity {
                    source_column: key.0,
                    raw_value: key.1,
                    name: name.clone(),
                }),
                None => {}
            }
        }
        (mappings, creations)
    }

    fn mark_defined(&mut self, key: &ValueKey) {
        if let Some(value) = self
            .unmapped
            .iter_mut()
            .find(|v| v.key() == (key.0.as_str(), key.1.as_str()))
        {
            value.mark_defined();
        }
        self.resolutions.remove(key);
    }
}

#[cfg(test)]
#[path = "review_test.rs"]
mod tests;
