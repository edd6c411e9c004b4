use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::models::BookingRow;
use crate::notify::NotifyConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<BookingEvent>,
    pub notify: NotifyConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct BookingEvent {
    pub kind: String,
    pub barbershop_id: String,
    pub booking_id: String,
    pub status: String,
    pub client_name: String,
    pub date: String,
    pub start_minute: i64,
    pub duration_minutes: i64,
    pub price: f64,
    pub service_name: Option<String>,
    pub professional_name: Option<String>,
}

impl BookingEvent {
    pub fn from_row(kind: &str, row: BookingRow) -> Self {
        Self {
            kind: kind.to_string(),
            barbershop_id: row.barbershop_id,
            booking_id: row.id,
            status: row.status,
            client_name: row.client_name,
            date: row.date,
            start_minute: row.start_minute,
            duration_minutes: row.duration_minutes,
            price: row.price,
            service_name: row.service_name,
            professional_name: row.professional_name,
        }
    }
}
