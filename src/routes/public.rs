use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    auth::{hash_password, new_id},
    db::{self, fetch_booking, fetch_shop_by_slug, log_activity},
    errors::{ApiError, SlotConflictBody},
    models::{
        BarbershopRow, GalleryImageRow, ProfessionalRow, ServiceRow, SubscriptionPlanRow,
        ROLE_OWNER, STATUS_PENDING,
    },
    notify,
    scheduling::{self, Interval, SlotCheck},
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::resource("/health").route(web::get().to(health)))
            .service(web::resource("/register").route(web::post().to(register_barbershop)))
            .service(web::resource("/bookings/{id}").route(web::get().to(booking_status)))
            .service(
                web::scope("/shops/{slug}")
                    .service(web::resource("").route(web::get().to(shop_profile)))
                    .service(web::resource("/services").route(web::get().to(list_services)))
                    .service(
                        web::resource("/professionals").route(web::get().to(list_professionals)),
                    )
                    .service(web::resource("/gallery").route(web::get().to(list_gallery)))
                    .service(web::resource("/plans").route(web::get().to(list_plans)))
                    .service(web::resource("/availability").route(web::get().to(availability)))
                    .service(web::resource("/bookings").route(web::post().to(create_booking))),
            ),
    );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn resolve_shop(state: &AppState, slug: &str) -> Result<BarbershopRow, ApiError> {
    fetch_shop_by_slug(&state.db, slug)
        .await?
        .ok_or(ApiError::NotFound("barbershop"))
}

async fn shop_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let shop = resolve_shop(&state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(shop))
}

async fn list_services(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let shop = resolve_shop(&state, &path.into_inner()).await?;
    let services = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, barbershop_id, name, description, duration_minutes, price, active, created_at
           FROM services WHERE barbershop_id = ? AND active = 1 ORDER BY name"#,
    )
    .bind(&shop.id)
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(services))
}

async fn list_professionals(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let shop = resolve_shop(&state, &path.into_inner()).await?;
    let rows = sqlx::query_as::<_, ProfessionalRow>(
        r#"SELECT id, barbershop_id, user_id, display_name, bio, avatar_url, commission_percent,
                  active, created_at
           FROM professionals WHERE barbershop_id = ? AND active = 1 ORDER BY display_name"#,
    )
    .bind(&shop.id)
    .fetch_all(&state.db)
    .await?;

    // Commission terms stay inside the back-office.
    let public: Vec<_> = rows
        .into_iter()
        .map(|p| {
            json!({
                "id": p.id,
                "display_name": p.display_name,
                "bio": p.bio,
                "avatar_url": p.avatar_url,
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(public))
}

async fn list_gallery(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let shop = resolve_shop(&state, &path.into_inner()).await?;
    let images = sqlx::query_as::<_, GalleryImageRow>(
        r#"SELECT id, barbershop_id, title, image_url, position, created_at
           FROM gallery_images WHERE barbershop_id = ? ORDER BY position, created_at"#,
    )
    .bind(&shop.id)
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(images))
}

async fn list_plans(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let shop = resolve_shop(&state, &path.into_inner()).await?;
    let plans = sqlx::query_as::<_, SubscriptionPlanRow>(
        r#"SELECT id, barbershop_id, name, description, price, services_per_month, active, created_at
           FROM subscription_plans WHERE barbershop_id = ? AND active = 1 ORDER BY price"#,
    )
    .bind(&shop.id)
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(plans))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("date must be YYYY-MM-DD".to_string()))
}

#[derive(Deserialize)]
struct AvailabilityQuery {
    professional_id: String,
    service_id: String,
    date: String,
    step: Option<i64>,
}

async fn availability(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ApiError> {
    let shop = resolve_shop(&state, &path.into_inner()).await?;
    let query = query.into_inner();
    let date = parse_date(&query.date)?;

    let service = db::fetch_active_service(&state.db, &shop.id, &query.service_id)
        .await?
        .ok_or(ApiError::NotFound("service"))?;
    db::fetch_active_professional(&state.db, &shop.id, &query.professional_id)
        .await?
        .ok_or(ApiError::NotFound("professional"))?;

    if !shop.is_open_on(date) {
        return Ok(HttpResponse::Ok().json(json!({
            "date": query.date,
            "open": false,
            "slots": [],
        })));
    }

    let busy = db::fetch_busy_for_day(&state.db, &query.professional_id, &query.date, None).await?;
    let step = query.step.unwrap_or(scheduling::DEFAULT_STEP_MINUTES);
    let slots = scheduling::free_slots(service.duration_minutes, &busy, shop.window(), step);

    Ok(HttpResponse::Ok().json(json!({
        "date": query.date,
        "open": true,
        "opening_minute": shop.opening_minute,
        "closing_minute": shop.closing_minute,
        "slots": slots,
    })))
}

#[derive(Debug, Deserialize, Validate)]
struct BookingRequest {
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

async fn create_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<BookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let shop = resolve_shop(&state, &path.into_inner()).await?;
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;
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

    let busy =
        db::fetch_busy_for_day(&state.db, &professional.id, &payload.date, None).await?;
    let candidate = Interval::new(payload.start_minute, service.duration_minutes);
    match scheduling::check_slot(
        candidate,
        &busy,
        shop.window(),
        scheduling::DEFAULT_STEP_MINUTES,
    ) {
        SlotCheck::Free => {}
        SlotCheck::OutsideHours => return Err(ApiError::OutsideHours),
        SlotCheck::Conflict { with, alternatives } => {
            return Err(ApiError::SlotTaken(SlotConflictBody {
                conflict_with: with,
                alternatives,
            }))
        }
    }

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
    .bind(STATUS_PENDING)
    .bind(&payload.notes)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        &shop.id,
        "booking_created",
        &format!(
            "New booking requested by {} for {}.",
            payload.client_name.trim(),
            service.name
        ),
        None,
        Some(&booking_id),
    )
    .await;

    let row = fetch_booking(&state.db, &booking_id)
        .await
        .ok_or(ApiError::NotFound("booking"))?;
    super::broadcast_and_notify(&state, notify::KIND_BOOKING_CREATED, row.clone());

    Ok(HttpResponse::Created().json(row))
}

async fn booking_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = fetch_booking(&state.db, &path.into_inner())
        .await
        .ok_or(ApiError::NotFound("booking"))?;

    // Public lookup: enough to follow the appointment, no client contact echo.
    Ok(HttpResponse::Ok().json(json!({
        "id": booking.id,
        "status": booking.status,
        "date": booking.date,
        "start_minute": booking.start_minute,
        "duration_minutes": booking.duration_minutes,
        "service_name": booking.service_name,
        "professional_name": booking.professional_name,
    })))
}

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(length(min = 1, message = "registration code is required"))]
    code: String,
    #[validate(length(min = 2, message = "shop name is required"))]
    shop_name: String,
    slug: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    #[validate(length(min = 3, message = "owner username is required"))]
    owner_username: String,
    #[validate(length(min = 1, message = "owner display name is required"))]
    owner_display_name: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    owner_password: String,
}

/// Multi-step signup: consumes a registration code, then creates the shop,
/// its owner account, and default notification settings in one transaction.
async fn register_barbershop(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;

    let slug = match payload.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => db::slugify(slug),
        _ => db::slugify(&payload.shop_name),
    };
    if slug.is_empty() {
        return Err(ApiError::BadRequest(
            "shop name does not produce a usable slug".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;

    let code = sqlx::query_as::<_, (i64,)>(
        "SELECT used FROM registration_codes WHERE code = ? LIMIT 1",
    )
    .bind(payload.code.trim())
    .fetch_optional(&mut *tx)
    .await?;
    match code {
        None => return Err(ApiError::BadRequest("invalid registration code".to_string())),
        Some((used,)) if used != 0 => {
            return Err(ApiError::BadRequest(
                "registration code already used".to_string(),
            ))
        }
        Some(_) => {}
    }

    let slug_taken =
        sqlx::query_as::<_, (String,)>("SELECT id FROM barbershops WHERE slug = ? LIMIT 1")
            .bind(&slug)
            .fetch_optional(&mut *tx)
            .await?;
    if slug_taken.is_some() {
        return Err(ApiError::BadRequest("slug already taken".to_string()));
    }

    let username_taken =
        sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE username = ? LIMIT 1")
            .bind(payload.owner_username.trim())
            .fetch_optional(&mut *tx)
            .await?;
    if username_taken.is_some() {
        return Err(ApiError::BadRequest("username already taken".to_string()));
    }

    let now = Utc::now().to_rfc3339();
    let shop_id = new_id();
    sqlx::query(
        r#"INSERT INTO barbershops
           (id, name, slug, phone, address, about, opening_minute, closing_minute,
            working_days, currency, created_at)
           VALUES (?, ?, ?, ?, ?, NULL, 540, 1140, '1,2,3,4,5,6', 'BRL', ?)"#,
    )
    .bind(&shop_id)
    .bind(payload.shop_name.trim())
    .bind(&slug)
    .bind(&payload.phone)
    .bind(&payload.address)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    let password_hash = hash_password(&payload.owner_password)
        .map_err(|_| ApiError::BadRequest("password could not be hashed".to_string()))?;
    let owner_id = new_id();
    sqlx::query(
        r#"INSERT INTO users (id, barbershop_id, username, display_name, role, password_hash, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&owner_id)
    .bind(&shop_id)
    .bind(payload.owner_username.trim())
    .bind(payload.owner_display_name.trim())
    .bind(ROLE_OWNER)
    .bind(password_hash)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"INSERT INTO notification_settings
           (barbershop_id, webhook_url, whatsapp_number, notify_on_create, notify_on_status)
           VALUES (?, NULL, NULL, 1, 1)"#,
    )
    .bind(&shop_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE registration_codes SET used = 1, used_by_barbershop_id = ? WHERE code = ?",
    )
    .bind(&shop_id)
    .bind(payload.code.trim())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    log_activity(
        &state.db,
        &shop_id,
        "barbershop_registered",
        &format!("Barbershop {} registered.", payload.shop_name.trim()),
        Some(&owner_id),
        None,
    )
    .await;

    Ok(HttpResponse::Created().json(json!({
        "barbershop_id": shop_id,
        "slug": slug,
        "owner_username": payload.owner_username.trim(),
    })))
}
