use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::scheduling::DayWindow;

pub const ROLE_PLATFORM_ADMIN: &str = "platform_admin";
pub const ROLE_OWNER: &str = "owner";
pub const ROLE_PROFESSIONAL: &str = "professional";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const BOOKING_STATUSES: [&str; 4] = [
    STATUS_PENDING,
    STATUS_CONFIRMED,
    STATUS_COMPLETED,
    STATUS_CANCELLED,
];

pub const SUBSCRIPTION_ACTIVE: &str = "active";
pub const SUBSCRIPTION_PAUSED: &str = "paused";
pub const SUBSCRIPTION_CANCELLED: &str = "cancelled";

pub const SUBSCRIPTION_STATUSES: [&str; 3] = [
    SUBSCRIPTION_ACTIVE,
    SUBSCRIPTION_PAUSED,
    SUBSCRIPTION_CANCELLED,
];

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BarbershopRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub opening_minute: i64,
    pub closing_minute: i64,
    pub working_days: String,
    pub currency: String,
    pub created_at: String,
}

impl BarbershopRow {
    pub fn window(&self) -> DayWindow {
        DayWindow {
            opening_minute: self.opening_minute,
            closing_minute: self.closing_minute,
        }
    }

    /// working_days holds ISO weekday numbers, Monday = 1.
    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().number_from_monday().to_string();
        self.working_days
            .split(',')
            .map(str::trim)
            .any(|day| day == weekday)
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub barbershop_id: Option<String>,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub password_hash: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProfessionalRow {
    pub id: String,
    pub barbershop_id: String,
    pub user_id: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub commission_percent: f64,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub barbershop_id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i64,
    pub price: f64,
    pub active: i64,
    pub created_at: String,
}

/// Booking joined with professional and service display names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingRow {
    pub id: String,
    pub barbershop_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub date: String,
    pub start_minute: i64,
    pub duration_minutes: i64,
    pub price: f64,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub professional_name: Option<String>,
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimeBlockRow {
    pub id: String,
    pub barbershop_id: String,
    pub professional_id: String,
    pub date: String,
    pub start_minute: i64,
    pub duration_minutes: i64,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionPlanRow {
    pub id: String,
    pub barbershop_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub services_per_month: i64,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClientSubscriptionRow {
    pub id: String,
    pub barbershop_id: String,
    pub plan_id: String,
    pub client_name: String,
    pub client_phone: String,
    pub status: String,
    pub started_at: String,
    pub created_at: String,
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommissionPaymentRow {
    pub id: String,
    pub barbershop_id: String,
    pub professional_id: String,
    pub amount: f64,
    pub period_start: String,
    pub period_end: String,
    pub note: Option<String>,
    pub paid_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GalleryImageRow {
    pub id: String,
    pub barbershop_id: String,
    pub title: String,
    pub image_url: String,
    pub position: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationSettingsRow {
    pub barbershop_id: String,
    pub webhook_url: Option<String>,
    pub whatsapp_number: Option<String>,
    pub notify_on_create: i64,
    pub notify_on_status: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::BarbershopRow;
    use chrono::NaiveDate;

    fn shop(working_days: &str) -> BarbershopRow {
        BarbershopRow {
            id: "shop-1".to_string(),
            name: "Navalha de Ouro".to_string(),
            slug: "navalha-de-ouro".to_string(),
            phone: None,
            address: None,
            about: None,
            opening_minute: 540,
            closing_minute: 1140,
            working_days: working_days.to_string(),
            currency: "BRL".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn open_days_follow_iso_weekday_numbers() {
        let shop = shop("1,2,3,4,5,6");
        // 2026-08-24 is a Monday, 2026-08-30 a Sunday.
        let monday = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        assert!(shop.is_open_on(monday));
        assert!(!shop.is_open_on(sunday));
    }

    #[test]
    fn working_days_tolerate_spaces() {
        let shop = shop("1, 3, 5");
        let wednesday = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        let thursday = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        assert!(shop.is_open_on(wednesday));
        assert!(!shop.is_open_on(thursday));
    }

    #[test]
    fn window_carries_opening_hours() {
        let window = shop("1").window();
        assert_eq!(window.opening_minute, 540);
        assert_eq!(window.closing_minute, 1140);
    }
}
