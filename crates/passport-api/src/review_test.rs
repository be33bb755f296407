use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;
use passport_core::{Category, RowStatus};

use super::*;
use crate::types::DefinedValue;

const JOB_ID: Uuid = Uuid::from_u128(0x0e11_a5e0);

fn job(status: ImportJobStatus) -> ImportJob {
    ImportJob {
        id: JOB_ID,
        status,
        file_name: Some("products.csv".to_string()),
        total_rows: 3,
        valid_rows: 2,
        error_rows: 1,
        created_at: Utc::now(),
    }
}

fn staging_row(row_number: u32) -> StagingRow {
    StagingRow {
        row_number,
        data: BTreeMap::from([("product_name".to_string(), format!("Product {row_number}"))]),
        status: RowStatus::Valid,
    }
}

fn unmapped(column: &str, raw: &str, rows: &[u32]) -> UnmappedValue {
    let mut value = UnmappedValue::new(column, raw);
    value.affected_rows = rows.to_vec();
    value
}

fn paged<T: Clone>(items: &[T], page: u32, page_size: u32) -> Page<T> {
    let start = ((page - 1) * page_size) as usize;
    Page {
        items: items
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect(),
        page,
        page_size,
        total: u32::try_from(items.len()).unwrap(),
    }
}

#[derive(Debug)]
struct FakeService {
    status: ImportJobStatus,
    rows: Vec<StagingRow>,
    row_errors: Vec<ImportRowError>,
    unmapped: Vec<UnmappedValue>,
    /// Raw values whose map or define call fails.
    failing: Mutex<HashSet<String>>,
    fail_define: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl FakeService {
    fn new(status: ImportJobStatus) -> Self {
        Self {
            status,
            rows: (1..=5).map(staging_row).collect(),
            row_errors: vec![ImportRowError {
                row_number: 3,
                field: Some("upid".to_string()),
                message: "duplicate upid".to_string(),
            }],
            unmapped: vec![
                unmapped("color_name", "Coral", &[1, 2]),
                unmapped("category_name", "Tshirt", &[1]),
                unmapped("material_1_name", "Hemp", &[2]),
            ],
            failing: Mutex::new(HashSet::new()),
            fail_define: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn fail_on(&self, raw_value: &str) {
        self.failing.lock().unwrap().insert(raw_value.to_string());
    }

    fn recover(&self) {
        self.failing.lock().unwrap().clear();
        *self.fail_define.lock().unwrap() = false;
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn rpc_error(message: &str) -> ApiError {
        ApiError::Rpc {
            procedure: "test".to_string(),
            code: "BAD_REQUEST".to_string(),
            message: message.to_string(),
        }
    }
}

impl ImportService for FakeService {
    async fn job_status(&self, _job_id: Uuid) -> Result<ImportJob, ApiError> {
        Ok(job(self.status))
    }

    async fn preview(
        &self,
        _job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Page<StagingRow>, ApiError> {
        self.record(format!("preview:{page}"));
        Ok(paged(&self.rows, page, page_size))
    }

    async fn errors(
        &self,
        _job_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Page<ImportRowError>, ApiError> {
        self.record(format!("errors:{page}"));
        Ok(paged(&self.row_errors, page, page_size))
    }

    async fn list_unmapped(&self, _job_id: Uuid) -> Result<Vec<UnmappedValue>, ApiError> {
        Ok(self.unmapped.clone())
    }

    async fn map_unmapped(
        &self,
        _job_id: Uuid,
        source_column: &str,
        raw_value: &str,
        entity_id: &str,
    ) -> Result<(), ApiError> {
        self.record(format!("map:{source_column}:{raw_value}:{entity_id}"));
        if self.failing.lock().unwrap().contains(raw_value) {
            return Err(Self::rpc_error("entity does not exist"));
        }
        Ok(())
    }

    async fn define_unmapped(
        &self,
        _job_id: Uuid,
        entities: &[PendingEntity],
    ) -> Result<Vec<DefinedValue>, ApiError> {
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        self.record(format!("define:{}", names.join(",")));
        if *self.fail_define.lock().unwrap() {
            return Err(Self::rpc_error("batch rejected"));
        }
        let failing = self.failing.lock().unwrap();
        Ok(entities
            .iter()
            .filter(|e| !failing.contains(&e.raw_value))
            .map(|e| DefinedValue {
                source_column: e.source_column.clone(),
                raw_value: e.raw_value.clone(),
                entity_id: format!("new-{}", e.name.to_lowercase()),
            })
            .collect())
    }

    async fn approve(&self, _job_id: Uuid) -> Result<ImportJob, ApiError> {
        self.record("approve".to_string());
        Ok(job(ImportJobStatus::Completed))
    }

    async fn cancel(&self, _job_id: Uuid) -> Result<ImportJob, ApiError> {
        self.record("cancel".to_string());
        Ok(job(ImportJobStatus::Cancelled))
    }
}

fn resolve_all(review: &mut ImportReview<'_, FakeService>) {
    review.map_value("color_name", "Coral", "c-9").unwrap();
    review.map_value("category_name", "Tshirt", "1").unwrap();
    review
        .create_value("material_1_name", "Hemp", "Hemp")
        .unwrap();
}

#[tokio::test]
async fn load_rejects_terminal_job() {
    let service = FakeService::new(ImportJobStatus::Completed);
    let err = ImportReview::load(&service, JOB_ID, 2).await.unwrap_err();
    assert!(matches!(
        err,
        ReviewError::JobClosed {
            status: ImportJobStatus::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn load_rejects_job_still_validating() {
    let service = FakeService::new(ImportJobStatus::Validating);
    let err = ImportReview::load(&service, JOB_ID, 2).await.unwrap_err();
    assert!(matches!(err, ReviewError::NotReady { .. }));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn load_fetches_first_pages_and_unmapped_values() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();

    assert_eq!(review.stage(), ReviewStage::Reviewing);
    assert_eq!(review.preview().page, 1);
    assert_eq!(review.preview().items.len(), 2);
    assert_eq!(review.errors().items.len(), 1);
    assert_eq!(review.unmapped().len(), 3);
    assert_eq!(review.unresolved().len(), 3);
}

#[tokio::test]
async fn preview_pages_advance_until_last() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();

    assert!(review.next_preview_page().await.unwrap());
    assert!(review.next_preview_page().await.unwrap());
    assert_eq!(review.preview().page, 3);
    assert_eq!(review.preview().items[0].row_number, 5);
    assert!(!review.next_preview_page().await.unwrap());
    assert!(!review.next_error_page().await.unwrap());
}

#[tokio::test]
async fn error_pages_advance_until_last() {
    let mut service = FakeService::new(ImportJobStatus::Validated);
    service.row_errors = (1..=3)
        .map(|row_number| ImportRowError {
            row_number,
            field: Some("product_name".to_string()),
            message: "product_name is required".to_string(),
        })
        .collect();
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();

    assert_eq!(review.errors().page, 1);
    assert_eq!(review.errors().items.len(), 2);
    assert!(review.next_error_page().await.unwrap());
    assert_eq!(review.errors().page, 2);
    assert_eq!(review.errors().items.len(), 1);
    assert_eq!(review.errors().items[0].row_number, 3);
    assert!(!review.next_error_page().await.unwrap());
    assert_eq!(review.errors().page, 2);
}

#[tokio::test]
async fn selecting_unknown_value_fails() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();

    let err = review.map_value("color_name", "Teal", "c-1").unwrap_err();
    assert!(matches!(err, ReviewError::UnknownValue { .. }));
    let err = review.map_value("size_name", "Coral", "c-1").unwrap_err();
    assert!(matches!(err, ReviewError::UnknownValue { .. }));
}

#[tokio::test]
async fn later_selection_replaces_earlier_and_can_be_cleared() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();

    review.map_value("color_name", "Coral", "c-1").unwrap();
    review
        .create_value("color_name", "Coral", "  Coral Pink ")
        .unwrap();
    assert_eq!(
        review.resolution("color_name", "Coral"),
        Some(&Resolution::Create {
            name: "Coral Pink".to_string()
        })
    );

    assert!(review.clear_resolution("color_name", "Coral").unwrap());
    assert!(!review.clear_resolution("color_name", "Coral").unwrap());
    assert_eq!(review.unresolved().len(), 3);
}

#[tokio::test]
async fn commit_refuses_while_values_are_unresolved() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();
    review.map_value("color_name", "Coral", "c-9").unwrap();

    let err = review.commit().await.unwrap_err();
    assert!(matches!(err, ReviewError::Unresolved { count: 2 }));
    assert!(
        !service.calls().iter().any(|c| c.starts_with("map:")),
        "nothing may be sent while values are unresolved"
    );
    assert_eq!(review.stage(), ReviewStage::Reviewing);
}

#[tokio::test]
async fn commit_defines_values_then_approves() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();
    resolve_all(&mut review);

    let job = review.commit().await.unwrap();
    assert_eq!(job.status, ImportJobStatus::Completed);
    assert_eq!(review.stage(), ReviewStage::Committed);
    assert!(review.unmapped().is_empty());

    let calls = service.calls();
    assert!(calls.contains(&"map:color_name:Coral:c-9".to_string()));
    assert!(calls.contains(&"map:category_name:Tshirt:1".to_string()));
    assert!(calls.contains(&"define:Hemp".to_string()));
    assert_eq!(calls.last().map(String::as_str), Some("approve"));
}

#[tokio::test]
async fn failed_mapping_blocks_approval_and_keeps_selection() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();
    resolve_all(&mut review);
    service.fail_on("Coral");

    let err = review.commit().await.unwrap_err();
    assert!(matches!(
        err,
        ReviewError::DefinitionFailed {
            failed: 1,
            attempted: 3
        }
    ));
    assert!(!service.calls().contains(&"approve".to_string()));
    assert_eq!(review.stage(), ReviewStage::Reviewing);

    let defined: Vec<&str> = review
        .unmapped()
        .iter()
        .filter(|v| v.is_defined)
        .map(|v| v.raw_value.as_str())
        .collect();
    assert_eq!(defined, vec!["Tshirt", "Hemp"]);
    assert_eq!(
        review.resolution("color_name", "Coral"),
        Some(&Resolution::Map {
            entity_id: "c-9".to_string()
        })
    );

    // A retry only resends what failed.
    service.recover();
    review.commit().await.unwrap();
    let calls = service.calls();
    let coral_maps = calls
        .iter()
        .filter(|c| c.starts_with("map:color_name:Coral"))
        .count();
    let tshirt_maps = calls
        .iter()
        .filter(|c| c.starts_with("map:category_name"))
        .count();
    assert_eq!(coral_maps, 2);
    assert_eq!(tshirt_maps, 1);
    assert_eq!(calls.iter().filter(|c| c.starts_with("define:")).count(), 1);
    assert_eq!(calls.last().map(String::as_str), Some("approve"));
}

#[tokio::test]
async fn failed_batch_define_counts_every_creation() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();
    review.create_all_unresolved().unwrap();
    *service.fail_define.lock().unwrap() = true;

    let err = review.commit().await.unwrap_err();
    assert!(matches!(
        err,
        ReviewError::DefinitionFailed {
            failed: 3,
            attempted: 3
        }
    ));
    assert!(review.unmapped().iter().all(|v| !v.is_defined));
    assert!(review.unresolved().is_empty());
}

#[tokio::test]
async fn values_missing_from_define_answer_count_as_failed() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();
    review.create_all_unresolved().unwrap();
    service.fail_on("Hemp");

    let err = review.commit().await.unwrap_err();
    assert!(matches!(
        err,
        ReviewError::DefinitionFailed {
            failed: 1,
            attempted: 3
        }
    ));
    assert_eq!(
        review.resolution("material_1_name", "Hemp"),
        Some(&Resolution::Create {
            name: "Hemp".to_string()
        })
    );
}

#[tokio::test]
async fn auto_resolve_maps_reconcilable_categories_only() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();
    let categories = vec![Category {
        id: "1".to_string(),
        name: "T-Shirts".to_string(),
        parent_id: None,
    }];
    let reconciler = CategoryReconciler::new(&categories);

    assert_eq!(review.auto_resolve_categories(&reconciler).unwrap(), 1);
    assert_eq!(
        review.resolution("category_name", "Tshirt"),
        Some(&Resolution::Map {
            entity_id: "1".to_string()
        })
    );
    assert!(review.resolution("color_name", "Coral").is_none());
    // Already-resolved values are not proposed again.
    assert_eq!(review.auto_resolve_categories(&reconciler).unwrap(), 0);
}

#[tokio::test]
async fn cancel_closes_the_review() {
    let service = FakeService::new(ImportJobStatus::Validated);
    let mut review = ImportReview::load(&service, JOB_ID, 2).await.unwrap();
    review.map_value("color_name", "Coral", "c-9").unwrap();

    let job = review.cancel().await.unwrap();
    assert_eq!(job.status, ImportJobStatus::Cancelled);
    assert_eq!(review.stage(), ReviewStage::Cancelled);
    assert!(review.unmapped().is_empty());

    assert!(matches!(
        review.map_value("color_name", "Coral", "c-9"),
        Err(ReviewError::JobClosed { .. })
    ));
    assert!(matches!(
        review.commit().await,
        Err(ReviewError::JobClosed { .. })
    ));
    assert!(matches!(
        review.cancel().await,
        Err(ReviewError::JobClosed { .. })
    ));
}
