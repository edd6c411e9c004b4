use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    auth::{hash_password, new_id, owner_validator, AuthUser},
    db::{self, booking_query, fetch_booking, fetch_shop_by_id, log_activity},
    errors::{ApiError, SlotConflictBody},
    models::{
        ActivityRow, BookingRow, ClientSubscriptionRow, GalleryImageRow, NotificationSettingsRow,
        ProfessionalRow, ServiceRow, SubscriptionPlanRow, TimeBlockRow, BOOKING_STATUSES,
        ROLE_PROFESSIONAL, STATUS_CANCELLED, STATUS_CONFIRMED, SUBSCRIPTION_ACTIVE,
        SUBSCRIPTION_STATUSES,
    },
    notify,
    scheduling::{self, Interval, SlotCheck},
    state::AppState,
};

use super::{broadcast_and_notify, public::parse_date};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(owner_validator))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(
                web::resource("/bookings")
                    .route(web::get().to(list_bookings))
                    .route(web::post().to(create_booking)),
            )
            .service(
                web::resource("/bookings/{id}")
                    .route(web::get().to(booking_detail))
                    .route(web::put().to(update_booking))
                    .route(web::delete().to(delete_booking)),
            )
            .service(web::resource("/clients").route(web::get().to(list_clients)))
            .service(
                web::resource("/services")
                    .route(web::get().to(list_services))
                    .route(web::post().to(create_service)),
            )
            .service(
                web::resource("/services/{id}")
                    .route(web::put().to(update_service))
                    .route(web::delete().to(delete_service)),
            )
            .service(
                web::resource("/professionals")
                    .route(web::get().to(list_professionals))
                    .route(web::post().to(create_professional)),
            )
            .service(
                web::resource("/professionals/{id}")
                    .route(web::put().to(update_professional))
                    .route(web::delete().to(delete_professional)),
            )
            .service(
                web::resource("/time-blocks")
                    .route(web::get().to(list_time_blocks))
                    .route(web::post().to(create_time_block)),
            )
            .service(
                web::resource("/time-blocks/{id}").route(web::delete().to(delete_time_block)),
            )
            .service(
                web::resource("/gallery")
                    .route(web::get().to(list_gallery))
                    .route(web::post().to(create_gallery_image)),
            )
            .service(
                web::resource("/gallery/{id}")
                    .route(web::put().to(update_gallery_image))
                    .route(web::delete().to(delete_gallery_image)),
            )
            .service(
                web::resource("/plans")
                    .route(web::get().to(list_plans))
                    .route(web::post().to(create_plan)),
            )
            .service(
                web::resource("/plans/{id}")
                    .route(web::put().to(update_plan))
                    .route(web::delete().to(delete_plan)),
            )
            .service(
                web::resource("/subscriptions")
                    .route(web::get().to(list_subscriptions))
                    .route(web::post().to(create_subscription)),
            )
            .service(
                web::resource("/subscriptions/{id}/status")
                    .route(web::put().to(update_subscription_status)),
            )
            .service(
                web::resource("/notification-settings")
                    .route(web::get().to(get_notification_settings))
                    .route(web::put().to(update_notification_settings)),
            )
            .service(
                web::resource("/settings")
                    .route(web::get().to(get_settings))
                    .route(web::put().to(update_settings)),
            ),
    );
}

async fn count(state: &AppState, query: &str, params: &[&str]) -> i64 {
    let mut q = sqlx::query_scalar::<_, i64>(query);
    for param in params {
        q = q.bind(*param);
    }
    q.fetch_one(&state.db).await.unwrap_or(0)
}

async fn dashboard(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let shop_id = auth.shop_id();
    let today = Utc::now().format("%Y-%m-%d").to_string();

    let total = count(
        &state,
        "SELECT COUNT(*) FROM bookings WHERE barbershop_id = ?",
        &[shop_id],
    )
    .await;
    let pending = count(
        &state,
        "SELECT COUNT(*) FROM bookings WHERE barbershop_id = ? AND status = 'pending'",
        &[shop_id],
    )
    .await;
    let today_count = count(
        &state,
        "SELECT COUNT(*) FROM bookings WHERE barbershop_id = ? AND date = ? AND status != 'cancelled'",
        &[shop_id, &today],
    )
    .await;
    let completed = count(
        &state,
        "SELECT COUNT(*) FROM bookings WHERE barbershop_id = ? AND status = 'completed'",
        &[shop_id],
    )
    .await;

    let agenda = sqlx::query_as::<_, BookingRow>(&booking_query(
        "b.barbershop_id = ? AND b.date = ? AND b.status != ?",
        "ORDER BY b.start_minute",
    ))
    .bind(shop_id)
    .bind(&today)
    .bind(STATUS_CANCELLED)
    .fetch_all(&state.db)
    .await?;

    let activities = sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities WHERE barbershop_id = ? ORDER BY created_at DESC LIMIT 10",
    )
    .bind(shop_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "stats": {
            "total_bookings": total,
            "pending": pending,
            "today": today_count,
            "completed": completed,
        },
        "agenda": agenda,
        "activities": activities,
    })))
}

#[derive(Deserialize)]
struct BookingFilter {
    date: Option<String>,
    status: Option<String>,
    professional_id: Option<String>,
}

async fn list_bookings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<BookingFilter>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner();
    let mut conditions = vec!["b.barbershop_id = ?".to_string()];
    let mut binds: Vec<String> = vec![auth.shop_id().to_string()];

    if let Some(date) = filter.date.as_deref().filter(|d| !d.is_empty()) {
        parse_date(date)?;
        conditions.push("b.date = ?".to_string());
        binds.push(date.to_string());
    }
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        if !BOOKING_STATUSES.contains(&status) {
            return Err(ApiError::BadRequest("invalid status filter".to_string()));
        }
        conditions.push("b.status = ?".to_string());
        binds.push(status.to_string());
    }
    if let Some(professional_id) = filter.professional_id.as_deref().filter(|p| !p.is_empty()) {
        conditions.push("b.professional_id = ?".to_string());
        binds.push(professional_id.to_string());
    }

    let query = booking_query(
        &conditions.join(" AND "),
        "ORDER BY b.date DESC, b.start_minute",
    );
    let mut q = sqlx::query_as::<_, BookingRow>(&query);
    for bind in &binds {
        q = q.bind(bind);
    }
    let bookings = q.fetch_all(&state.db).await?;

    Ok(HttpResponse::Ok().json(bookings))
}

async fn fetch_own_booking(
    state: &AppState,
    auth: &AuthUser,
    booking_id: &str,
) -> Result<BookingRow, ApiError> {
    let booking = fetch_booking(&state.db, booking_id)
        .await
        .ok_or(ApiError::NotFound("booking"))?;
    if booking.barbershop_id != auth.shop_id() {
        return Err(ApiError::NotFound("booking"));
    }
    Ok(booking)
}

async fn booking_detail(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = fetch_own_booking(&state, &auth, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(booking))
}

#[derive(Debug, Deserialize, Validate)]
struct AdminBookingRequest {
    professional_id: String,
    service_id: String,
    #[validate(length(min = 1, message = "client name is required"))]
    client_name: String,
    #[validate(length(min = 5, message = "client phone is required"))]
    client_phone: String,
    #[validate(email)]
    client_email: Option<String>,
    date: String,
    #[validate(range(min = 0, max = 1439))]
    start_minute: i64,
    notes: Option<String>,
}

/// Booking created from the back-office on behalf of a walk-in or phone
/// client. Starts confirmed rather than pending.
async fn create_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<AdminBookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;
    let shop = fetch_shop_by_id(&state.db, auth.shop_id())
        .await?
        .ok_or(ApiError::NotFound("barbershop"))?;
    let date = parse_date(&payload.date)?;
    if !shop.is_open_on(date) {
        return Err(ApiError::BadRequest(
            "the barbershop is closed on that day".to_string(),
        ));
    }

    let service = db::fetch_active_service(&state.db, &shop.id, &payload.service_id)
        .await?
        .ok_or(ApiError::NotFound("service"))?;
    let professional =
        db::fetch_active_professional(&state.db, &shop.id, &payload.professional_id)
            .await?
            .ok_or(ApiError::NotFound("professional"))?;

    let busy = db::fetch_busy_for_day(&state.db, &professional.id, &payload.date, None).await?;
    check_candidate(
        Interval::new(payload.start_minute, service.duration_minutes),
        &busy,
        &shop,
    )?;

    let booking_id = new_id();
    sqlx::query(
        r#"INSERT INTO bookings
           (id, barbershop_id, professional_id, service_id, client_name, client_phone,
            client_email, date, start_minute, duration_minutes, price, status, notes, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&booking_id)
    .bind(&shop.id)
    .bind(&professional.id)
    .bind(&service.id)
    .bind(payload.client_name.trim())
    .bind(payload.client_phone.trim())
    .bind(&payload.client_email)
    .bind(&payload.date)
    .bind(payload.start_minute)
    .bind(service.duration_minutes)
    .bind(service.price)
    .bind(STATUS_CONFIRMED)
    .bind(&payload.notes)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        &shop.id,
        "booking_created",
        &format!(
            "{} booked {} for {}.",
            auth.display_name,
            service.name,
            payload.client_name.trim()
        ),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let row = fetch_booking(&state.db, &booking_id)
        .await
        .ok_or(ApiError::NotFound("booking"))?;
    broadcast_and_notify(&state, notify::KIND_BOOKING_CREATED, row.clone());

    Ok(HttpResponse::Created().json(row))
}

fn check_candidate(
    candidate: Interval,
    busy: &[scheduling::Busy],
    shop: &crate::models::BarbershopRow,
) -> Result<(), ApiError> {
    match scheduling::check_slot(candidate, busy, shop.window(), scheduling::DEFAULT_STEP_MINUTES)
    {
        SlotCheck::Free => Ok(()),
        SlotCheck::OutsideHours => Err(ApiError::OutsideHours),
        SlotCheck::Conflict { with, alternatives } => Err(ApiError::SlotTaken(SlotConflictBody {
            conflict_with: with,
            alternatives,
        })),
    }
}

#[derive(Debug, Deserialize)]
struct BookingUpdateRequest {
    status: Option<String>,
    professional_id: Option<String>,
    date: Option<String>,
    start_minute: Option<i64>,
    // Absent field keeps the current notes; an explicit null clears them.
    #[serde(default, deserialize_with = "field_present")]
    notes: Option<Option<String>>,
}

fn field_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// A slot must be re-validated when the booking moves, and also when a
/// cancelled booking is brought back: its old slot may have been given away
/// while it was out of the busy set.
fn slot_check_required(current_status: &str, new_status: &str, rescheduled: bool) -> bool {
    new_status != STATUS_CANCELLED && (rescheduled || current_status == STATUS_CANCELLED)
}

async fn update_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<BookingUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let payload = payload.into_inner();
    let booking = fetch_own_booking(&state, &auth, &booking_id).await?;

    let status = match payload.status {
        Some(status) => {
            if !BOOKING_STATUSES.contains(&status.as_str()) {
                return Err(ApiError::BadRequest("invalid status".to_string()));
            }
            status
        }
        None => booking.status.clone(),
    };

    let professional_id = payload
        .professional_id
        .unwrap_or_else(|| booking.professional_id.clone());
    let date = payload.date.unwrap_or_else(|| booking.date.clone());
    let start_minute = payload.start_minute.unwrap_or(booking.start_minute);
    let notes = match payload.notes {
        Some(value) => value,
        None => booking.notes.clone(),
    };

    let rescheduled = professional_id != booking.professional_id
        || date != booking.date
        || start_minute != booking.start_minute;

    if slot_check_required(&booking.status, &status, rescheduled) {
        let shop = fetch_shop_by_id(&state.db, auth.shop_id())
            .await?
            .ok_or(ApiError::NotFound("barbershop"))?;
        let parsed = parse_date(&date)?;
        if !shop.is_open_on(parsed) {
            return Err(ApiError::BadRequest(
                "the barbershop is closed on that day".to_string(),
            ));
        }
        db::fetch_active_professional(&state.db, &shop.id, &professional_id)
            .await?
            .ok_or(ApiError::NotFound("professional"))?;
        let busy =
            db::fetch_busy_for_day(&state.db, &professional_id, &date, Some(&booking_id)).await?;
        check_candidate(
            Interval::new(start_minute, booking.duration_minutes),
            &busy,
            &shop,
        )?;
    }

    sqlx::query(
        r#"UPDATE bookings
           SET status = ?, professional_id = ?, date = ?, start_minute = ?, notes = ?
           WHERE id = ? AND barbershop_id = ?"#,
    )
    .bind(&status)
    .bind(&professional_id)
    .bind(&date)
    .bind(start_minute)
    .bind(&notes)
    .bind(&booking_id)
    .bind(auth.shop_id())
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        auth.shop_id(),
        "booking_updated",
        &format!(
            "{} updated booking {} to {}.",
            auth.display_name, booking_id, status
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

async fn delete_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let result = sqlx::query("DELETE FROM bookings WHERE id = ? AND barbershop_id = ?")
        .bind(&booking_id)
        .bind(auth.shop_id())
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("booking"));
    }

    log_activity(
        &state.db,
        auth.shop_id(),
        "booking_deleted",
        &format!("{} deleted booking {}.", auth.display_name, booking_id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
struct ClientRow {
    client_name: String,
    client_phone: String,
    visit_count: i64,
    completed_count: i64,
    total_spent: f64,
    last_visit: Option<String>,
}

/// Clients are derived from booking history, keyed by phone.
async fn list_clients(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let clients = sqlx::query_as::<_, ClientRow>(
        r#"SELECT client_name, client_phone,
                  COUNT(*) AS visit_count,
                  SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) AS completed_count,
                  COALESCE(SUM(CASE WHEN status = 'completed' THEN price ELSE 0 END), 0) AS total_spent,
                  MAX(CASE WHEN status = 'completed' THEN date END) AS last_visit
           FROM bookings
           WHERE barbershop_id = ?
           GROUP BY client_phone
           ORDER BY visit_count DESC, client_name"#,
    )
    .bind(auth.shop_id())
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(clients))
}

// --- services ---------------------------------------------------------------

async fn list_services(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let services = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, barbershop_id, name, description, duration_minutes, price, active, created_at
           FROM services WHERE barbershop_id = ? ORDER BY name"#,
    )
    .bind(auth.shop_id())
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(services))
}

#[derive(Debug, Deserialize, Validate)]
struct ServiceRequest {
    #[validate(length(min = 1, message = "service name is required"))]
    name: String,
    description: Option<String>,
    #[validate(range(min = 5, max = 480, message = "duration must be 5-480 minutes"))]
    duration_minutes: i64,
    #[validate(range(min = 0.0))]
    price: f64,
    active: Option<bool>,
}

async fn create_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<ServiceRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO services (id, barbershop_id, name, description, duration_minutes, price, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(auth.shop_id())
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.duration_minutes)
    .bind(payload.price)
    .bind(payload.active.unwrap_or(true) as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    let service = db::fetch_service_any(&state.db, auth.shop_id(), &id)
        .await?
        .ok_or(ApiError::NotFound("service"))?;
    Ok(HttpResponse::Created().json(service))
}

async fn update_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<ServiceRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let result = sqlx::query(
        r#"UPDATE services SET name = ?, description = ?, duration_minutes = ?, price = ?, active = ?
           WHERE id = ? AND barbershop_id = ?"#,
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.duration_minutes)
    .bind(payload.price)
    .bind(payload.active.unwrap_or(true) as i64)
    .bind(&id)
    .bind(auth.shop_id())
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("service"));
    }

    let service = db::fetch_service_any(&state.db, auth.shop_id(), &id)
        .await?
        .ok_or(ApiError::NotFound("service"))?;
    Ok(HttpResponse::Ok().json(service))
}

async fn delete_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result = sqlx::query("DELETE FROM services WHERE id = ? AND barbershop_id = ?")
        .bind(path.into_inner())
        .bind(auth.shop_id())
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("service"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// --- professionals ----------------------------------------------------------

async fn list_professionals(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let professionals = sqlx::query_as::<_, ProfessionalRow>(
        r#"SELECT id, barbershop_id, user_id, display_name, bio, avatar_url, commission_percent,
                  active, created_at
           FROM professionals WHERE barbershop_id = ? ORDER BY display_name"#,
    )
    .bind(auth.shop_id())
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(professionals))
}

#[derive(Debug, Deserialize, Validate)]
struct ProfessionalRequest {
    #[validate(length(min = 1, message = "display name is required"))]
    display_name: String,
    bio: Option<String>,
    avatar_url: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "commission must be 0-100%"))]
    commission_percent: f64,
    active: Option<bool>,
    // Optional back-office login for the professional.
    username: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    password: Option<String>,
}

async fn create_professional(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<ProfessionalRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;
    let now = Utc::now().to_rfc3339();

    let user_id = match (
        payload.username.as_deref().map(str::trim).filter(|u| !u.is_empty()),
        payload.password.as_deref(),
    ) {
        (Some(username), Some(password)) => {
            let taken =
                sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE username = ? LIMIT 1")
                    .bind(username)
                    .fetch_optional(&state.db)
                    .await?;
            if taken.is_some() {
                return Err(ApiError::BadRequest("username already taken".to_string()));
            }
            let password_hash = hash_password(password)
                .map_err(|_| ApiError::BadRequest("password could not be hashed".to_string()))?;
            let user_id = new_id();
            sqlx::query(
                r#"INSERT INTO users (id, barbershop_id, username, display_name, role, password_hash, active, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
            )
            .bind(&user_id)
            .bind(auth.shop_id())
            .bind(username)
            .bind(payload.display_name.trim())
            .bind(ROLE_PROFESSIONAL)
            .bind(password_hash)
            .bind(&now)
            .execute(&state.db)
            .await?;
            Some(user_id)
        }
        (Some(_), None) => {
            return Err(ApiError::BadRequest(
                "password is required when creating a login".to_string(),
            ))
        }
        _ => None,
    };

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO professionals
           (id, barbershop_id, user_id, display_name, bio, avatar_url, commission_percent, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(auth.shop_id())
    .bind(&user_id)
    .bind(payload.display_name.trim())
    .bind(&payload.bio)
    .bind(&payload.avatar_url)
    .bind(payload.commission_percent)
    .bind(payload.active.unwrap_or(true) as i64)
    .bind(&now)
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        auth.shop_id(),
        "professional_created",
        &format!(
            "{} added professional {}.",
            auth.display_name,
            payload.display_name.trim()
        ),
        Some(&auth.id),
        None,
    )
    .await;

    let professional = fetch_professional_any(&state, auth.shop_id(), &id).await?;
    Ok(HttpResponse::Created().json(professional))
}

async fn fetch_professional_any(
    state: &AppState,
    shop_id: &str,
    id: &str,
) -> Result<ProfessionalRow, ApiError> {
    sqlx::query_as::<_, ProfessionalRow>(
        r#"SELECT id, barbershop_id, user_id, display_name, bio, avatar_url, commission_percent,
                  active, created_at
           FROM professionals WHERE id = ? AND barbershop_id = ? LIMIT 1"#,
    )
    .bind(id)
    .bind(shop_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("professional"))
}

async fn update_professional(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<ProfessionalRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let result = sqlx::query(
        r#"UPDATE professionals
           SET display_name = ?, bio = ?, avatar_url = ?, commission_percent = ?, active = ?
           WHERE id = ? AND barbershop_id = ?"#,
    )
    .bind(payload.display_name.trim())
    .bind(&payload.bio)
    .bind(&payload.avatar_url)
    .bind(payload.commission_percent)
    .bind(payload.active.unwrap_or(true) as i64)
    .bind(&id)
    .bind(auth.shop_id())
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("professional"));
    }

    let professional = fetch_professional_any(&state, auth.shop_id(), &id).await?;
    Ok(HttpResponse::Ok().json(professional))
}

async fn delete_professional(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    // Soft delete keeps booking history intact.
    let result =
        sqlx::query("UPDATE professionals SET active = 0 WHERE id = ? AND barbershop_id = ?")
            .bind(path.into_inner())
            .bind(auth.shop_id())
            .execute(&state.db)
            .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("professional"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// --- time blocks ------------------------------------------------------------

#[derive(Deserialize)]
struct TimeBlockFilter {
    date: Option<String>,
    professional_id: Option<String>,
}

async fn list_time_blocks(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<TimeBlockFilter>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner();
    let mut conditions = vec!["barbershop_id = ?".to_string()];
    let mut binds = vec![auth.shop_id().to_string()];
    if let Some(date) = filter.date.as_deref().filter(|d| !d.is_empty()) {
        parse_date(date)?;
        conditions.push("date = ?".to_string());
        binds.push(date.to_string());
    }
    if let Some(professional_id) = filter.professional_id.as_deref().filter(|p| !p.is_empty()) {
        conditions.push("professional_id = ?".to_string());
        binds.push(professional_id.to_string());
    }

    let query = format!(
        r#"SELECT id, barbershop_id, professional_id, date, start_minute, duration_minutes,
                  reason, created_at
           FROM time_blocks WHERE {} ORDER BY date, start_minute"#,
        conditions.join(" AND ")
    );
    let mut q = sqlx::query_as::<_, TimeBlockRow>(&query);
    for bind in &binds {
        q = q.bind(bind);
    }
    let blocks = q.fetch_all(&state.db).await?;

    Ok(HttpResponse::Ok().json(blocks))
}

#[derive(Debug, Deserialize, Validate)]
struct TimeBlockRequest {
    professional_id: String,
    date: String,
    #[validate(range(min = 0, max = 1439))]
    start_minute: i64,
    #[validate(range(min = 5, max = 1440, message = "duration must be 5-1440 minutes"))]
    duration_minutes: i64,
    #[validate(length(min = 1, message = "reason is required"))]
    reason: String,
}

async fn create_time_block(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<TimeBlockRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;
    parse_date(&payload.date)?;

    db::fetch_active_professional(&state.db, auth.shop_id(), &payload.professional_id)
        .await?
        .ok_or(ApiError::NotFound("professional"))?;

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO time_blocks
           (id, barbershop_id, professional_id, date, start_minute, duration_minutes, reason, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(auth.shop_id())
    .bind(&payload.professional_id)
    .bind(&payload.date)
    .bind(payload.start_minute)
    .bind(payload.duration_minutes)
    .bind(payload.reason.trim())
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

async fn delete_time_block(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result = sqlx::query("DELETE FROM time_blocks WHERE id = ? AND barbershop_id = ?")
        .bind(path.into_inner())
        .bind(auth.shop_id())
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("time block"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// --- gallery ----------------------------------------------------------------

async fn list_gallery(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let images = sqlx::query_as::<_, GalleryImageRow>(
        r#"SELECT id, barbershop_id, title, image_url, position, created_at
           FROM gallery_images WHERE barbershop_id = ? ORDER BY position, created_at"#,
    )
    .bind(auth.shop_id())
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(images))
}

#[derive(Debug, Deserialize, Validate)]
struct GalleryImageRequest {
    #[validate(length(min = 1, message = "title is required"))]
    title: String,
    #[validate(url(message = "image_url must be a valid URL"))]
    image_url: String,
    position: Option<i64>,
}

async fn create_gallery_image(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<GalleryImageRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO gallery_images (id, barbershop_id, title, image_url, position, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(auth.shop_id())
    .bind(payload.title.trim())
    .bind(payload.image_url.trim())
    .bind(payload.position.unwrap_or(0))
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

async fn update_gallery_image(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<GalleryImageRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let result = sqlx::query(
        r#"UPDATE gallery_images SET title = ?, image_url = ?, position = ?
           WHERE id = ? AND barbershop_id = ?"#,
    )
    .bind(payload.title.trim())
    .bind(payload.image_url.trim())
    .bind(payload.position.unwrap_or(0))
    .bind(path.into_inner())
    .bind(auth.shop_id())
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("gallery image"));
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn delete_gallery_image(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result = sqlx::query("DELETE FROM gallery_images WHERE id = ? AND barbershop_id = ?")
        .bind(path.into_inner())
        .bind(auth.shop_id())
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("gallery image"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// --- subscription plans -----------------------------------------------------

async fn list_plans(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let plans = sqlx::query_as::<_, SubscriptionPlanRow>(
        r#"SELECT id, barbershop_id, name, description, price, services_per_month, active, created_at
           FROM subscription_plans WHERE barbershop_id = ? ORDER BY price"#,
    )
    .bind(auth.shop_id())
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(plans))
}

#[derive(Debug, Deserialize, Validate)]
struct PlanRequest {
    #[validate(length(min = 1, message = "plan name is required"))]
    name: String,
    description: Option<String>,
    #[validate(range(min = 0.0))]
    price: f64,
    #[validate(range(min = 1, max = 100))]
    services_per_month: i64,
    active: Option<bool>,
}

async fn create_plan(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<PlanRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO subscription_plans
           (id, barbershop_id, name, description, price, services_per_month, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(auth.shop_id())
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.price)
    .bind(payload.services_per_month)
    .bind(payload.active.unwrap_or(true) as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

async fn update_plan(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<PlanRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let result = sqlx::query(
        r#"UPDATE subscription_plans
           SET name = ?, description = ?, price = ?, services_per_month = ?, active = ?
           WHERE id = ? AND barbershop_id = ?"#,
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.price)
    .bind(payload.services_per_month)
    .bind(payload.active.unwrap_or(true) as i64)
    .bind(path.into_inner())
    .bind(auth.shop_id())
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("subscription plan"));
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn delete_plan(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result =
        sqlx::query("UPDATE subscription_plans SET active = 0 WHERE id = ? AND barbershop_id = ?")
            .bind(path.into_inner())
            .bind(auth.shop_id())
            .execute(&state.db)
            .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("subscription plan"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// --- client subscriptions ---------------------------------------------------

async fn list_subscriptions(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let subscriptions = sqlx::query_as::<_, ClientSubscriptionRow>(
        r#"SELECT cs.id, cs.barbershop_id, cs.plan_id, cs.client_name, cs.client_phone,
                  cs.status, cs.started_at, cs.created_at, sp.name AS plan_name
           FROM client_subscriptions cs
           LEFT JOIN subscription_plans sp ON cs.plan_id = sp.id
           WHERE cs.barbershop_id = ?
           ORDER BY cs.created_at DESC"#,
    )
    .bind(auth.shop_id())
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(subscriptions))
}

#[derive(Debug, Deserialize, Validate)]
struct SubscriptionRequest {
    plan_id: String,
    #[validate(length(min = 1, message = "client name is required"))]
    client_name: String,
    #[validate(length(min = 5, message = "client phone is required"))]
    client_phone: String,
}

async fn create_subscription(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<SubscriptionRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let plan = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM subscription_plans WHERE id = ? AND barbershop_id = ? AND active = 1 LIMIT 1",
    )
    .bind(&payload.plan_id)
    .bind(auth.shop_id())
    .fetch_optional(&state.db)
    .await?;
    if plan.is_none() {
        return Err(ApiError::NotFound("subscription plan"));
    }

    let now = Utc::now().to_rfc3339();
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO client_subscriptions
           (id, barbershop_id, plan_id, client_name, client_phone, status, started_at, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(auth.shop_id())
    .bind(&payload.plan_id)
    .bind(payload.client_name.trim())
    .bind(payload.client_phone.trim())
    .bind(SUBSCRIPTION_ACTIVE)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({ "id": id, "status": SUBSCRIPTION_ACTIVE })))
}

#[derive(Debug, Deserialize)]
struct SubscriptionStatusRequest {
    status: String,
}

async fn update_subscription_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    payload: web::Json<SubscriptionStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let status = payload.into_inner().status;
    if !SUBSCRIPTION_STATUSES.contains(&status.as_str()) {
        return Err(ApiError::BadRequest("invalid subscription status".to_string()));
    }

    let result =
        sqlx::query("UPDATE client_subscriptions SET status = ? WHERE id = ? AND barbershop_id = ?")
            .bind(&status)
            .bind(path.into_inner())
            .bind(auth.shop_id())
            .execute(&state.db)
            .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("subscription"));
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "status": status })))
}

// --- settings ---------------------------------------------------------------

async fn get_notification_settings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let settings = sqlx::query_as::<_, NotificationSettingsRow>(
        r#"SELECT barbershop_id, webhook_url, whatsapp_number, notify_on_create, notify_on_status
           FROM notification_settings WHERE barbershop_id = ?"#,
    )
    .bind(auth.shop_id())
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("notification settings"))?;
    Ok(HttpResponse::Ok().json(settings))
}

#[derive(Debug, Deserialize, Validate)]
struct NotificationSettingsRequest {
    #[validate(url(message = "webhook_url must be a valid URL"))]
    webhook_url: Option<String>,
    whatsapp_number: Option<String>,
    notify_on_create: bool,
    notify_on_status: bool,
}

async fn update_notification_settings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<NotificationSettingsRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    sqlx::query(
        r#"INSERT INTO notification_settings
           (barbershop_id, webhook_url, whatsapp_number, notify_on_create, notify_on_status)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT(barbershop_id) DO UPDATE SET
             webhook_url = excluded.webhook_url,
             whatsapp_number = excluded.whatsapp_number,
             notify_on_create = excluded.notify_on_create,
             notify_on_status = excluded.notify_on_status"#,
    )
    .bind(auth.shop_id())
    .bind(&payload.webhook_url)
    .bind(&payload.whatsapp_number)
    .bind(payload.notify_on_create as i64)
    .bind(payload.notify_on_status as i64)
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn get_settings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let shop = fetch_shop_by_id(&state.db, auth.shop_id())
        .await?
        .ok_or(ApiError::NotFound("barbershop"))?;
    Ok(HttpResponse::Ok().json(shop))
}

#[derive(Debug, Deserialize, Validate)]
struct ShopSettingsRequest {
    #[validate(length(min = 2, message = "shop name is required"))]
    name: String,
    phone: Option<String>,
    address: Option<String>,
    about: Option<String>,
    #[validate(range(min = 0, max = 1439))]
    opening_minute: i64,
    #[validate(range(min = 1, max = 1440))]
    closing_minute: i64,
    working_days: String,
    currency: Option<String>,
}

/// The slug is fixed at registration time; public links must not break.
async fn update_settings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<ShopSettingsRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;
    if payload.closing_minute <= payload.opening_minute {
        return Err(ApiError::BadRequest(
            "closing time must be after opening time".to_string(),
        ));
    }
    let valid_days = payload
        .working_days
        .split(',')
        .map(str::trim)
        .all(|day| matches!(day, "1" | "2" | "3" | "4" | "5" | "6" | "7"));
    if payload.working_days.trim().is_empty() || !valid_days {
        return Err(ApiError::BadRequest(
            "working_days must be a comma-separated list of 1-7".to_string(),
        ));
    }

    sqlx::query(
        r#"UPDATE barbershops
           SET name = ?, phone = ?, address = ?, about = ?, opening_minute = ?,
               closing_minute = ?, working_days = ?, currency = COALESCE(?, currency)
           WHERE id = ?"#,
    )
    .bind(payload.name.trim())
    .bind(&payload.phone)
    .bind(&payload.address)
    .bind(&payload.about)
    .bind(payload.opening_minute)
    .bind(payload.closing_minute)
    .bind(payload.working_days.trim())
    .bind(&payload.currency)
    .bind(auth.shop_id())
    .execute(&state.db)
    .await?;

    let shop = fetch_shop_by_id(&state.db, auth.shop_id())
        .await?
        .ok_or(ApiError::NotFound("barbershop"))?;
    Ok(HttpResponse::Ok().json(shop))
}

#[cfg(test)]
mod tests {
    use super::{slot_check_required, BookingUpdateRequest};
    use crate::models::{STATUS_CANCELLED, STATUS_COMPLETED, STATUS_CONFIRMED, STATUS_PENDING};

    #[test]
    fn reactivating_a_cancelled_booking_requires_a_slot_check() {
        // The cancelled booking left the busy set, so its slot may be taken.
        assert!(slot_check_required(STATUS_CANCELLED, STATUS_CONFIRMED, false));
        assert!(slot_check_required(STATUS_CANCELLED, STATUS_PENDING, false));
    }

    #[test]
    fn forward_status_moves_keep_the_slot_without_a_check() {
        assert!(!slot_check_required(STATUS_PENDING, STATUS_CONFIRMED, false));
        assert!(!slot_check_required(STATUS_CONFIRMED, STATUS_COMPLETED, false));
    }

    #[test]
    fn rescheduling_requires_a_check_unless_the_target_is_cancelled() {
        assert!(slot_check_required(STATUS_CONFIRMED, STATUS_CONFIRMED, true));
        assert!(!slot_check_required(STATUS_CONFIRMED, STATUS_CANCELLED, true));
        assert!(!slot_check_required(STATUS_CANCELLED, STATUS_CANCELLED, false));
    }

    #[test]
    fn booking_update_distinguishes_missing_notes_from_null() {
        let keep: BookingUpdateRequest =
            serde_json::from_str(r#"{"status":"confirmed"}"#).unwrap();
        assert_eq!(keep.notes, None);

        let clear: BookingUpdateRequest = serde_json::from_str(r#"{"notes":null}"#).unwrap();
        assert_eq!(clear.notes, Some(None));

        let set: BookingUpdateRequest = serde_json::from_str(r#"{"notes":"walk-in"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("walk-in".to_string())));
    }
}
