use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    auth::{new_id, owner_validator, AuthUser},
    db,
    errors::ApiError,
    finance::{self, BookingFigures, PayoutFigures, ProfessionalRate},
    models::{CommissionPaymentRow, STATUS_COMPLETED},
    state::AppState,
};

use super::public::parse_date;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/finance")
            .wrap(HttpAuthentication::basic(owner_validator))
            .service(web::resource("/summary").route(web::get().to(summary)))
            .service(web::resource("/commissions").route(web::get().to(commissions)))
            .service(
                web::resource("/commissions/payments")
                    .route(web::get().to(list_payments))
                    .route(web::post().to(record_payment)),
            ),
    );
}

#[derive(Deserialize)]
struct PeriodQuery {
    from: Option<String>,
    to: Option<String>,
}

/// Defaults to the current month so the dashboard works with no query at all.
fn resolve_period(query: PeriodQuery) -> Result<(String, String), ApiError> {
    let today = Utc::now().date_naive();
    let from = match query.from.as_deref().filter(|f| !f.is_empty()) {
        Some(from) => {
            parse_date(from)?;
            from.to_string()
        }
        None => NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string(),
    };
    let to = match query.to.as_deref().filter(|t| !t.is_empty()) {
        Some(to) => {
            parse_date(to)?;
            to.to_string()
        }
        None => today.format("%Y-%m-%d").to_string(),
    };
    if to < from {
        return Err(ApiError::BadRequest(
            "period end must not be before period start".to_string(),
        ));
    }
    Ok((from, to))
}

#[derive(Debug, sqlx::FromRow)]
struct FigureRow {
    date: String,
    professional_id: String,
    professional_name: Option<String>,
    service_name: Option<String>,
    price: f64,
    status: String,
}

async fn fetch_figures(
    pool: &SqlitePool,
    shop_id: &str,
    from: &str,
    to: &str,
    only_status: Option<&str>,
) -> Result<Vec<BookingFigures>, sqlx::Error> {
    let mut query = String::from(
        r#"SELECT b.date, b.professional_id, b.price, b.status,
                  p.display_name AS professional_name, s.name AS service_name
           FROM bookings b
           LEFT JOIN professionals p ON b.professional_id = p.id
           LEFT JOIN services s ON b.service_id = s.id
           WHERE b.barbershop_id = ? AND b.date >= ? AND b.date <= ?"#,
    );
    if only_status.is_some() {
        query.push_str(" AND b.status = ?");
    }

    let mut q = sqlx::query_as::<_, FigureRow>(&query)
        .bind(shop_id)
        .bind(from)
        .bind(to);
    if let Some(status) = only_status {
        q = q.bind(status);
    }
    let rows = q.fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| BookingFigures {
            date: row.date,
            professional_id: row.professional_id,
            professional_name: row
                .professional_name
                .unwrap_or_else(|| "Unknown".to_string()),
            service_name: row.service_name.unwrap_or_else(|| "Unknown".to_string()),
            price: row.price,
            status: row.status,
        })
        .collect())
}

async fn summary(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse, ApiError> {
    let (from, to) = resolve_period(query.into_inner())?;
    let figures = fetch_figures(&state.db, auth.shop_id(), &from, &to, None).await?;

    Ok(HttpResponse::Ok().json(json!({
        "from": from,
        "to": to,
        "summary": finance::summarize(&figures),
        "by_day": finance::revenue_by_day(&figures),
        "by_service": finance::revenue_by_service(&figures),
        "by_professional": finance::revenue_by_professional(&figures),
    })))
}

async fn commissions(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse, ApiError> {
    let (from, to) = resolve_period(query.into_inner())?;
    let shop_id = auth.shop_id();

    let completed =
        fetch_figures(&state.db, shop_id, &from, &to, Some(STATUS_COMPLETED)).await?;

    // Inactive professionals keep their history, so no active filter here.
    let professionals = sqlx::query_as::<_, (String, String, f64)>(
        "SELECT id, display_name, commission_percent FROM professionals WHERE barbershop_id = ? ORDER BY display_name",
    )
    .bind(shop_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(|(id, name, commission_percent)| ProfessionalRate {
        id,
        name,
        commission_percent,
    })
    .collect::<Vec<_>>();

    let payouts = sqlx::query_as::<_, (String, f64)>(
        r#"SELECT professional_id, amount FROM commission_payments
           WHERE barbershop_id = ? AND period_end >= ? AND period_start <= ?"#,
    )
    .bind(shop_id)
    .bind(&from)
    .bind(&to)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(|(professional_id, amount)| PayoutFigures {
        professional_id,
        amount,
    })
    .collect::<Vec<_>>();

    let lines = finance::commission_lines(&professionals, &completed, &payouts);

    Ok(HttpResponse::Ok().json(json!({ "from": from, "to": to, "lines": lines })))
}

#[derive(Debug, Deserialize, Validate)]
struct PaymentRequest {
    professional_id: String,
    #[validate(range(min = 0.01, message = "amount must be positive"))]
    amount: f64,
    period_start: String,
    period_end: String,
    note: Option<String>,
}

async fn record_payment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<PaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate().map_err(ApiError::validation)?;
    parse_date(&payload.period_start)?;
    parse_date(&payload.period_end)?;
    if payload.period_end < payload.period_start {
        return Err(ApiError::BadRequest(
            "period end must not be before period start".to_string(),
        ));
    }

    let professional = sqlx::query_as::<_, (String, String)>(
        "SELECT id, display_name FROM professionals WHERE id = ? AND barbershop_id = ? LIMIT 1",
    )
    .bind(&payload.professional_id)
    .bind(auth.shop_id())
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("professional"))?;

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO commission_payments
           (id, barbershop_id, professional_id, amount, period_start, period_end, note, paid_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(auth.shop_id())
    .bind(&payload.professional_id)
    .bind(payload.amount)
    .bind(&payload.period_start)
    .bind(&payload.period_end)
    .bind(&payload.note)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    db::log_activity(
        &state.db,
        auth.shop_id(),
        "commission_paid",
        &format!(
            "{} recorded a {:.2} commission payout to {}.",
            auth.display_name, payload.amount, professional.1
        ),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

#[derive(Deserialize)]
struct PaymentFilter {
    professional_id: Option<String>,
}

async fn list_payments(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<PaymentFilter>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner();
    let mut conditions = vec!["barbershop_id = ?".to_string()];
    let mut binds = vec![auth.shop_id().to_string()];
    if let Some(professional_id) = filter.professional_id.as_deref().filter(|p| !p.is_empty()) {
        conditions.push("professional_id = ?".to_string());
        binds.push(professional_id.to_string());
    }

    let query = format!(
        r#"SELECT id, barbershop_id, professional_id, amount, period_start, period_end, note, paid_at
           FROM commission_payments WHERE {} ORDER BY paid_at DESC"#,
        conditions.join(" AND ")
    );
    let mut q = sqlx::query_as::<_, CommissionPaymentRow>(&query);
    for bind in &binds {
        q = q.bind(bind);
    }
    let payments = q.fetch_all(&state.db).await?;

    Ok(HttpResponse::Ok().json(payments))
}
