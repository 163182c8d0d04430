//! Excursion and session handlers
//!
//! Reads are public. Creating excursions needs a publisher role; sessions
//! and weekly schedules are managed by the excursion owner or an
//! administrator. Deletions go through the compensation orchestrator and can
//! return the ledger as CSV.

use crate::dto::{
    ApiResponse, DeletionResponse, ExcursionFilterParams, ExportFormat, ExportParams,
    PaginationParams, ScheduleRequest, SessionRequest,
};
use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{web, HttpResponse};
use tourdesk_auth::{AuthenticatedUser, PublisherUser};
use tourdesk_core::models::{CompensationReport, NewExcursion};
use tourdesk_core::AppError;
use tourdesk_services::notifications::CSV_CONTENT_TYPE;
use tourdesk_services::BookingServices;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// List excursions
///
/// GET /api/v1/excursions
#[instrument(skip(services, user))]
pub async fn list_excursions(
    services: web::Data<BookingServices>,
    query: web::Query<PaginationParams>,
    filters: web::Query<ExcursionFilterParams>,
    user: Option<AuthenticatedUser>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let owner_id = if filters.mine() {
        let user = user.ok_or_else(|| {
            AppError::Unauthorized("Sign in to list your own excursions".to_string())
        })?;
        Some(user.user_id)
    } else {
        None
    };

    let excursions = services
        .catalog
        .list_excursions(owner_id, &query.to_pagination())
        .await?;
    debug!("Listed {} excursions", excursions.len());

    Ok(HttpResponse::Ok().json(ApiResponse::success(excursions)))
}

/// Publish an excursion
///
/// POST /api/v1/excursions
#[instrument(skip(services, user, req))]
pub async fn create_excursion(
    services: web::Data<BookingServices>,
    user: PublisherUser,
    req: web::Json<NewExcursion>,
) -> Result<HttpResponse, AppError> {
    let excursion = services
        .catalog
        .create_excursion(&user, req.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        excursion,
        "Excursion published",
    )))
}

/// Excursion with photos and session availability
///
/// GET /api/v1/excursions/{id}
#[instrument(skip(services))]
pub async fn get_excursion(
    services: web::Data<BookingServices>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let details = services.catalog.excursion_details(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(details)))
}

/// Delete an excursion, cancelling and refunding every booking
///
/// DELETE /api/v1/excursions/{id}
#[instrument(skip(services, user))]
pub async fn delete_excursion(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    query: web::Query<ExportParams>,
) -> Result<HttpResponse, AppError> {
    let excursion_id = path.into_inner();
    let report = services
        .compensation
        .delete_excursion(&user, excursion_id)
        .await?;

    info!(
        "Excursion {} deleted by user {}, {} reservations cancelled",
        excursion_id,
        user.user_id,
        report.ledger.len()
    );
    Ok(deletion_response(report, query.export))
}

/// Add a session to an excursion
///
/// POST /api/v1/excursions/{id}/sessions
#[instrument(skip(services, user, req))]
pub async fn create_session(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<SessionRequest>,
) -> Result<HttpResponse, AppError> {
    let draft = req.to_draft()?;
    let session = services
        .catalog
        .create_session(&user, path.into_inner(), draft)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(session)))
}

/// Reschedule or resize a session
///
/// PUT /api/v1/excursions/{id}/sessions/{session_id}
#[instrument(skip(services, user, req))]
pub async fn update_session(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<SessionRequest>,
) -> Result<HttpResponse, AppError> {
    let (excursion_id, session_id) = path.into_inner();
    let draft = req.to_draft()?;
    let session = services
        .catalog
        .update_session(&user, excursion_id, session_id, draft)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(session)))
}

/// Delete a session, cancelling and refunding its bookings
///
/// DELETE /api/v1/excursions/{id}/sessions/{session_id}
#[instrument(skip(services, user))]
pub async fn delete_session(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<(i64, i64)>,
    query: web::Query<ExportParams>,
) -> Result<HttpResponse, AppError> {
    let (excursion_id, session_id) = path.into_inner();
    let report = services
        .compensation
        .delete_session(&user, excursion_id, session_id)
        .await?;

    Ok(deletion_response(report, query.export))
}

/// Weekly schedules of an excursion
///
/// GET /api/v1/excursions/{id}/schedules
#[instrument(skip(services, user))]
pub async fn list_schedules(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let schedules = services
        .schedules
        .list_schedules(&user, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(schedules)))
}

/// Register a weekly schedule and publish its first weeks
///
/// POST /api/v1/excursions/{id}/schedules
#[instrument(skip(services, user, req))]
pub async fn create_schedule(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<ScheduleRequest>,
) -> Result<HttpResponse, AppError> {
    let draft = req.to_draft()?;
    let published = services
        .schedules
        .create_schedule(&user, path.into_inner(), draft)
        .await?;

    let message = format!("{} sessions published", published.published.len());
    Ok(HttpResponse::Created().json(ApiResponse::with_message(published, message)))
}

/// Stop a weekly schedule, keeping the sessions it published
///
/// DELETE /api/v1/excursions/{id}/schedules/{schedule_id}
#[instrument(skip(services, user))]
pub async fn delete_schedule(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let (excursion_id, schedule_id) = path.into_inner();
    services
        .schedules
        .delete_schedule(&user, excursion_id, schedule_id)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// JSON report, or the ledger as a CSV attachment
fn deletion_response(mut report: CompensationReport, format: ExportFormat) -> HttpResponse {
    if format == ExportFormat::Csv {
        if let Some(csv) = report.export_csv.take() {
            let filename = report.scope.export_filename();
            return HttpResponse::Ok()
                .content_type(CSV_CONTENT_TYPE)
                .insert_header(ContentDisposition {
                    disposition: DispositionType::Attachment,
                    parameters: vec![
                        DispositionParam::Filename(filename.clone()),
                        DispositionParam::FilenameExt(ExtendedValue {
                            charset: Charset::Ext("UTF-8".to_string()),
                            language_tag: None,
                            value: filename.into_bytes(),
                        }),
                    ],
                })
                .body(csv);
        }
    }

    HttpResponse::Ok().json(ApiResponse::success(DeletionResponse::from(report)))
}

/// Configure excursion and session routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/excursions")
            .route("", web::get().to(list_excursions))
            .route("", web::post().to(create_excursion))
            .route("/{id}", web::get().to(get_excursion))
            .route("/{id}", web::delete().to(delete_excursion))
            .route("/{id}/sessions", web::post().to(create_session))
            .route("/{id}/sessions/{session_id}", web::put().to(update_session))
            .route("/{id}/sessions/{session_id}", web::delete().to(delete_session))
            .route("/{id}/schedules", web::get().to(list_schedules))
            .route("/{id}/schedules", web::post().to(create_schedule))
            .route("/{id}/schedules/{schedule_id}", web::delete().to(delete_schedule)),
    );
}
