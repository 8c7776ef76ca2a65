use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use alerta_types::events::{EventPublisher, NotificationEvent};
use alerta_types::models::{Location, MAX_MEDIA_PER_REPORT, Report, ReportStatus};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("report not found: {0}")]
    NotFound(Uuid),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatus { from: ReportStatus, to: ReportStatus },
    #[error("category must not be empty")]
    MissingCategory,
    #[error("too many media attachments: {0} (max {MAX_MEDIA_PER_REPORT})")]
    TooManyMedia(usize),
    #[error("report store lock poisoned")]
    LockPoisoned,
}

/// Input for [`ReportStore::create`]. Media entries are references to
/// already-stored assets.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub owner_id: Uuid,
    pub category: String,
    pub description: String,
    pub location: Option<Location>,
    pub media: Vec<String>,
}

/// Holds every report in insertion order and enforces the lifecycle.
///
/// Each mutation publishes its event while the write lock is still held:
/// events leave in mutation order, and a subscriber that re-reads the store
/// on receipt waits for the lock and sees the new state.
pub struct ReportStore {
    reports: RwLock<Vec<Report>>,
    publisher: Arc<dyn EventPublisher>,
}

impl ReportStore {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
            publisher,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Report>>, StoreError> {
        self.reports.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Report>>, StoreError> {
        self.reports.write().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn create(&self, new: NewReport) -> Result<Report, StoreError> {
        let category = new.category.trim();
        if category.is_empty() {
            return Err(StoreError::MissingCategory);
        }
        if new.media.len() > MAX_MEDIA_PER_REPORT {
            return Err(StoreError::TooManyMedia(new.media.len()));
        }

        let report = Report {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            category: category.to_string(),
            description: new.description,
            location: new.location,
            media: new.media,
            status: ReportStatus::Pending,
            created_at: chrono::Utc::now(),
        };

        let mut reports = self.write()?;
        reports.push(report.clone());
        self.publisher
            .publish(NotificationEvent::ReportCreated(report.clone()));
        drop(reports);

        info!(
            "Report {} ({}) created by {}",
            report.id, report.category, report.owner_id
        );
        Ok(report)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        Ok(self.read()?.iter().find(|r| r.id == id).cloned())
    }

    /// Every report, oldest first.
    pub fn list_all(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.read()?.clone())
    }

    /// Reports filed by `owner_id`, oldest first.
    pub fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Report>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    /// Move a report along its lifecycle.
    ///
    /// Requesting the current status succeeds without touching the record
    /// and without publishing.
    pub fn set_status(&self, id: Uuid, status: ReportStatus) -> Result<Report, StoreError> {
        let mut reports = self.write()?;
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;

        if report.status == status {
            debug!("Report {} already {}, nothing to do", id, status);
            return Ok(report.clone());
        }
        if !report.status.can_transition_to(status) {
            return Err(StoreError::InvalidStatus {
                from: report.status,
                to: status,
            });
        }

        let from = report.status;
        report.status = status;
        let updated = report.clone();
        self.publisher
            .publish(NotificationEvent::StatusChanged { id, status });
        drop(reports);

        info!("Report {} moved {} -> {}", id, from, status);
        Ok(updated)
    }

    /// Remove a report, returning the removed record.
    pub fn delete(&self, id: Uuid) -> Result<Report, StoreError> {
        let mut reports = self.write()?;
        let idx = reports
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;

        let removed = reports.remove(idx);
        self.publisher.publish(NotificationEvent::ReportDeleted { id });
        drop(reports);

        info!("Report {} deleted", id);
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }
}
