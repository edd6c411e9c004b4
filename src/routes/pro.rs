use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{professional_validator, AuthUser},
    db::{booking_query, fetch_booking, log_activity},
    errors::ApiError,
    models::{
        BookingRow, ProfessionalRow, STATUS_CANCELLED, STATUS_COMPLETED, STATUS_CONFIRMED,
    },
    notify,
    state::AppState,
};

use super::{broadcast_and_notify, public::parse_date};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/pro")
            .wrap(HttpAuthentication::basic(professional_validator))
            .service(web::resource("/agenda").route(web::get().to(agenda)))
            .service(web::resource("/stats").route(web::get().to(stats)))
            .service(
                web::resource("/bookings/{id}/status").route(web::post().to(update_status)),
            ),
    );
}

/// Maps the logged-in user to their professional profile. An account whose
/// profile was deactivated still authenticates but gets a 404 here.
async fn resolve_professional(
    state: &AppState,
    auth: &AuthUser,
) -> Result<ProfessionalRow, ApiError> {
    sqlx::query_as::<_, ProfessionalRow>(
        r#"SELECT id, barbershop_id, user_id, display_name, bio, avatar_url, commission_percent,
                  active, created_at
           FROM professionals WHERE user_id = ? AND active = 1 LIMIT 1"#,
    )
    .bind(&auth.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("professional profile"))
}

#[derive(Deserialize)]
struct AgendaQuery {
    date: Option<String>,
}

async fn agenda(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<AgendaQuery>,
) -> Result<HttpResponse, ApiError> {
    let professional = resolve_professional(&state, &auth).await?;
    let date = match query.into_inner().date {
        Some(date) => {
            parse_date(&date)?;
            date
        }
        None => Utc::now().format("%Y-%m-%d").to_string(),
    };

    let bookings = sqlx::query_as::<_, BookingRow>(&booking_query(
        "b.professional_id = ? AND b.date = ? AND b.status != ?",
        "ORDER BY b.start_minute",
    ))
    .bind(&professional.id)
    .bind(&date)
    .bind(STATUS_CANCELLED)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "date": date, "bookings": bookings })))
}

#[derive(Debug, sqlx::FromRow)]
struct ProStats {
    total: i64,
    completed: i64,
    upcoming: i64,
    revenue: f64,
}

async fn stats(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let professional = resolve_professional(&state, &auth).await?;
    let today = Utc::now().format("%Y-%m-%d").to_string();

    let stats = sqlx::query_as::<_, ProStats>(
        r#"SELECT COUNT(*) AS total,
                  COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                  COALESCE(SUM(CASE WHEN date >= ? AND status IN ('pending', 'confirmed') THEN 1 ELSE 0 END), 0) AS upcoming,
                  COALESCE(SUM(CASE WHEN status = 'completed' THEN price ELSE 0 END), 0) AS revenue
           FROM bookings WHERE professional_id = ?"#,
    )
    .bind(&today)
    .bind(&professional.id)
    .fetch_one(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "professional": professional.display_name,
        "commission_percent": professional.commission_percent,
        "total_bookings": stats.total,
        "completed": stats.completed,
        "upcoming": stats.upcoming,
        "revenue": stats.revenue,
        "estimated_commission": stats.revenue * professional.commission_percent / 100.0,
    })))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
}

/// Professionals can move their own bookings forward (confirm, complete) or
/// cancel them, but never edit another professional's agenda.
async fn update_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let professional = resolve_professional(&state, &auth).await?;
    let booking_id = path.into_inner();
    let status = payload.into_inner().status;
    if ![STATUS_CONFIRMED, STATUS_COMPLETED, STATUS_CANCELLED].contains(&status.as_str()) {
        return Err(ApiError::BadRequest("invalid status".to_string()));
    }

    let result = sqlx::query(
        "UPDATE bookings SET status = ? WHERE id = ? AND professional_id = ?",
    )
    .bind(&status)
    .bind(&booking_id)
    .bind(&professional.id)
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("booking"));
    }

    log_activity(
        &state.db,
        &professional.barbershop_id,
        "booking_updated",
        &format!(
            "{} marked booking {} as {}.",
            professional.display_name, booking_id, status
        ),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let row = fetch_booking(&state.db, &booking_id)
        .await
        .ok_or(ApiError::NotFound("booking"))?;
    broadcast_and_notify(&state, notify::KIND_BOOKING_UPDATED, row.clone());

    Ok(HttpResponse::Ok().json(row))
}
