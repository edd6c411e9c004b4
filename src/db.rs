use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{
        BarbershopRow, BookingRow, ProfessionalRow, ServiceRow, TimeBlockRow,
        ROLE_PLATFORM_ADMIN, STATUS_CANCELLED,
    },
    scheduling::{Busy, BusySource, Interval},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_platform_admin(pool).await?;
    seed_registration_codes(pool).await?;
    Ok(())
}

async fn seed_platform_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_PLATFORM_ADMIN)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let username = env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let display_name =
        env::var("ADMIN_DISPLAY_NAME").unwrap_or_else(|_| "Platform Admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash = hash_password(&password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (id, barbershop_id, username, display_name, role, password_hash, active, created_at)
           VALUES (?, NULL, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(username)
    .bind(display_name)
    .bind(ROLE_PLATFORM_ADMIN)
    .bind(password_hash)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Registration is gated by single-use codes, seeded from a comma-separated
/// REGISTRATION_CODES env var.
async fn seed_registration_codes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let Ok(raw) = env::var("REGISTRATION_CODES") else {
        return Ok(());
    };

    for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        sqlx::query(
            r#"INSERT INTO registration_codes (code, used, used_by_barbershop_id, created_at)
               VALUES (?, 0, NULL, ?)
               ON CONFLICT(code) DO NOTHING"#,
        )
        .bind(code)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    barbershop_id: &str,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    booking_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, barbershop_id, kind, message, created_at, user_id, booking_id)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(barbershop_id)
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(booking_id)
    .execute(pool)
    .await;
}

const BOOKING_SELECT: &str = r#"SELECT b.id, b.barbershop_id, b.professional_id, b.service_id,
       b.client_name, b.client_phone, b.client_email, b.date, b.start_minute,
       b.duration_minutes, b.price, b.status, b.notes, b.created_at,
       p.display_name AS professional_name, s.name AS service_name
  FROM bookings b
  LEFT JOIN professionals p ON b.professional_id = p.id
  LEFT JOIN services s ON b.service_id = s.id"#;

pub fn booking_query(where_clause: &str, tail: &str) -> String {
    let mut query = BOOKING_SELECT.to_string();
    if !where_clause.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(where_clause);
    }
    if !tail.is_empty() {
        query.push(' ');
        query.push_str(tail);
    }
    query
}

pub async fn fetch_booking(pool: &SqlitePool, booking_id: &str) -> Option<BookingRow> {
    sqlx::query_as::<_, BookingRow>(&booking_query("b.id = ?", "LIMIT 1"))
        .bind(booking_id)
        .fetch_optional(pool)
        .await
        .unwrap_or(None)
}

pub async fn fetch_shop_by_slug(
    pool: &SqlitePool,
    slug: &str,
) -> Result<Option<BarbershopRow>, sqlx::Error> {
    sqlx::query_as::<_, BarbershopRow>(
        r#"SELECT id, name, slug, phone, address, about, opening_minute, closing_minute,
                  working_days, currency, created_at
           FROM barbershops WHERE slug = ? LIMIT 1"#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_shop_by_id(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<BarbershopRow>, sqlx::Error> {
    sqlx::query_as::<_, BarbershopRow>(
        r#"SELECT id, name, slug, phone, address, about, opening_minute, closing_minute,
                  working_days, currency, created_at
           FROM barbershops WHERE id = ? LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_active_service(
    pool: &SqlitePool,
    barbershop_id: &str,
    service_id: &str,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, barbershop_id, name, description, duration_minutes, price, active, created_at
           FROM services WHERE id = ? AND barbershop_id = ? AND active = 1 LIMIT 1"#,
    )
    .bind(service_id)
    .bind(barbershop_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_service_any(
    pool: &SqlitePool,
    barbershop_id: &str,
    service_id: &str,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, barbershop_id, name, description, duration_minutes, price, active, created_at
           FROM services WHERE id = ? AND barbershop_id = ? LIMIT 1"#,
    )
    .bind(service_id)
    .bind(barbershop_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_active_professional(
    pool: &SqlitePool,
    barbershop_id: &str,
    professional_id: &str,
) -> Result<Option<ProfessionalRow>, sqlx::Error> {
    sqlx::query_as::<_, ProfessionalRow>(
        r#"SELECT id, barbershop_id, user_id, display_name, bio, avatar_url, commission_percent,
                  active, created_at
           FROM professionals WHERE id = ? AND barbershop_id = ? AND active = 1 LIMIT 1"#,
    )
    .bind(professional_id)
    .bind(barbershop_id)
    .fetch_optional(pool)
    .await
}

/// A professional's occupied intervals on a day: live bookings plus manual
/// time blocks. `exclude_booking` skips the booking being rescheduled.
pub async fn fetch_busy_for_day(
    pool: &SqlitePool,
    professional_id: &str,
    date: &str,
    exclude_booking: Option<&str>,
) -> Result<Vec<Busy>, sqlx::Error> {
    let bookings = sqlx::query_as::<_, BookingRow>(&booking_query(
        "b.professional_id = ? AND b.date = ? AND b.status != ?",
        "ORDER BY b.start_minute",
    ))
    .bind(professional_id)
    .bind(date)
    .bind(STATUS_CANCELLED)
    .fetch_all(pool)
    .await?;

    let blocks = sqlx::query_as::<_, TimeBlockRow>(
        r#"SELECT id, barbershop_id, professional_id, date, start_minute, duration_minutes,
                  reason, created_at
           FROM time_blocks
           WHERE professional_id = ? AND date = ?
           ORDER BY start_minute"#,
    )
    .bind(professional_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    let mut busy = Vec::with_capacity(bookings.len() + blocks.len());
    for booking in bookings {
        if exclude_booking == Some(booking.id.as_str()) {
            continue;
        }
        busy.push(Busy {
            interval: Interval::new(booking.start_minute, booking.duration_minutes),
            label: booking.service_name.unwrap_or_else(|| "Booking".to_string()),
            source: BusySource::Booking { id: booking.id },
        });
    }
    for block in blocks {
        busy.push(Busy {
            interval: Interval::new(block.start_minute, block.duration_minutes),
            label: block.reason,
            source: BusySource::TimeBlock { id: block.id },
        });
    }
    Ok(busy)
}

/// Lowercases, keeps ascii alphanumerics, collapses everything else to single
/// hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Navalha de Ouro"), "navalha-de-ouro");
        assert_eq!(slugify("  The Cut & Shave!  "), "the-cut-shave");
        assert_eq!(slugify("Barber2Go"), "barber2go");
        assert_eq!(slugify("---"), "");
    }
}
