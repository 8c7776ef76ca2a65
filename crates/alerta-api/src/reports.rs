use axum::{
    Extension, Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use alerta_db::NewReport;
use alerta_types::api::{DeleteReportResponse, ReportView, UpdateStatusRequest};
use alerta_types::models::{Location, MAX_MEDIA_PER_REPORT, Principal, ReportStatus, Role};

use crate::error::ApiError;
use crate::media::MAX_MEDIA_BYTES;
use crate::middleware::require_role;
use crate::state::AppState;

/// Shown for reports whose owner no longer resolves.
const UNKNOWN_OWNER: &str = "Unknown";

struct Attachment {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

/// Parsed `POST /reports` multipart body.
#[derive(Default)]
struct ReportForm {
    category: String,
    description: String,
    lat: Option<f64>,
    lng: Option<f64>,
    attachments: Vec<Attachment>,
}

impl ReportForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "category" => form.category = field.text().await.map_err(multipart_error)?,
                "description" => form.description = field.text().await.map_err(multipart_error)?,
                "lat" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.lat = parse_coordinate("lat", &text)?;
                }
                "lng" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.lng = parse_coordinate("lng", &text)?;
                }
                "media" => {
                    if form.attachments.len() == MAX_MEDIA_PER_REPORT {
                        return Err(ApiError::Validation(format!(
                            "at most {MAX_MEDIA_PER_REPORT} media attachments per report"
                        )));
                    }
                    let file_name = field.file_name().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    if bytes.len() > MAX_MEDIA_BYTES {
                        return Err(ApiError::PayloadTooLarge(format!(
                            "attachment exceeds {MAX_MEDIA_BYTES} bytes"
                        )));
                    }
                    form.attachments.push(Attachment {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                other => {
                    return Err(ApiError::Validation(format!("unexpected form field: {other:?}")));
                }
            }
        }

        Ok(form)
    }
}

/// Blank means absent; anything else must be a number.
fn parse_coordinate(field: &str, text: &str) -> Result<Option<f64>, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| ApiError::Validation(format!("{field} is not a number: {text:?}")))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::Validation(e.body_text())
    }
}

/// POST /reports: multipart form with `category`, `description`, `lat`,
/// `lng` and up to five `media` files.
pub async fn create_report(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart?;
    let form = ReportForm::read(&mut multipart).await?;

    // Validate everything before any attachment touches the disk
    if form.category.trim().is_empty() {
        return Err(ApiError::Validation("missing required field: category".into()));
    }
    let location = Location::from_parts(form.lat, form.lng)?;

    let mut media = Vec::with_capacity(form.attachments.len());
    for attachment in &form.attachments {
        media.push(
            state
                .media
                .store(attachment.file_name.as_deref(), &attachment.bytes)
                .await?,
        );
    }

    let report = state.reports.create(NewReport {
        owner_id: principal.subject_id,
        category: form.category,
        description: form.description,
        location,
        media,
    })?;

    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /reports: every report with its owner's display name. Admin only.
pub async fn list_reports(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&principal, Role::Admin)?;

    let reports = state.reports.list_all()?;
    // One snapshot of names instead of a lookup per report
    let names = state.identities.display_names()?;

    let views: Vec<ReportView> = reports
        .into_iter()
        .map(|report| {
            let owner_name = names.get(&report.owner_id).cloned().unwrap_or_else(|| {
                warn!("Report {} has unknown owner {}", report.id, report.owner_id);
                UNKNOWN_OWNER.to_string()
            });
            ReportView { report, owner_name }
        })
        .collect();

    Ok(Json(views))
}

/// GET /my-reports: the caller's own reports.
pub async fn my_reports(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let reports = state.reports.list_by_owner(principal.subject_id)?;
    Ok(Json(reports))
}

/// PUT /reports/{id}/status: admin moves a report along its lifecycle.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    report_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&principal, Role::Admin)?;
    let Path(report_id) = report_id?;
    let Json(req) = payload?;

    let status: ReportStatus = req.status.parse()?;
    let report = state.reports.set_status(report_id, status)?;
    Ok(Json(report))
}

/// DELETE /reports/{id}: admin removes a report.
pub async fn delete_report(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    report_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&principal, Role::Admin)?;
    let Path(report_id) = report_id?;

    state.reports.delete(report_id)?;
    info!("{} deleted report {}", principal.subject_id, report_id);

    Ok(Json(DeleteReportResponse {
        success: true,
        id: report_id,
    }))
}
