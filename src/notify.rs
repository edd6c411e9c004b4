use std::env;

use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    models::NotificationSettingsRow,
    state::{AppState, BookingEvent},
};

pub const KIND_BOOKING_CREATED: &str = "booking_created";
pub const KIND_BOOKING_UPDATED: &str = "booking_updated";

#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub whatsapp_gateway_url: Option<String>,
    client: reqwest::Client,
}

impl NotifyConfig {
    pub fn from_env() -> Self {
        Self {
            whatsapp_gateway_url: env::var("WHATSAPP_GATEWAY_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }
}

/// Delivers a booking event to the shop's configured channels. Failures are
/// logged and swallowed so they never block the booking flow.
pub async fn booking_event(state: &AppState, event: &BookingEvent) {
    let settings = match fetch_settings(&state.db, &event.barbershop_id).await {
        Ok(Some(settings)) => settings,
        Ok(None) => return,
        Err(err) => {
            log::warn!("Failed to load notification settings: {err}");
            return;
        }
    };

    let wanted = match event.kind.as_str() {
        KIND_BOOKING_CREATED => settings.notify_on_create == 1,
        _ => settings.notify_on_status == 1,
    };
    if !wanted {
        return;
    }

    if let Some(url) = settings.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        if let Err(err) = post_webhook(&state.notify, url, event).await {
            log::warn!("Webhook delivery failed: {err}");
        }
    }

    if let Some(number) = settings
        .whatsapp_number
        .as_deref()
        .filter(|n| !n.trim().is_empty())
    {
        match state.notify.whatsapp_gateway_url.as_deref() {
            Some(gateway) => {
                if let Err(err) = post_whatsapp(&state.notify, gateway, number, event).await {
                    log::warn!("WhatsApp delivery failed: {err}");
                }
            }
            None => log::debug!("WhatsApp number set but no gateway configured"),
        }
    }
}

async fn fetch_settings(
    pool: &SqlitePool,
    barbershop_id: &str,
) -> Result<Option<NotificationSettingsRow>, sqlx::Error> {
    sqlx::query_as::<_, NotificationSettingsRow>(
        r#"SELECT barbershop_id, webhook_url, whatsapp_number, notify_on_create, notify_on_status
           FROM notification_settings WHERE barbershop_id = ?"#,
    )
    .bind(barbershop_id)
    .fetch_optional(pool)
    .await
}

async fn post_webhook(
    config: &NotifyConfig,
    url: &str,
    event: &BookingEvent,
) -> Result<(), reqwest::Error> {
    config
        .client
        .post(url)
        .json(event)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

async fn post_whatsapp(
    config: &NotifyConfig,
    gateway: &str,
    number: &str,
    event: &BookingEvent,
) -> Result<(), reqwest::Error> {
    let message = format!(
        "{}: {} on {} at {:02}:{:02} ({})",
        event.kind.replace('_', " "),
        event.client_name,
        event.date,
        event.start_minute / 60,
        event.start_minute % 60,
        event.status,
    );
    config
        .client
        .post(gateway)
        .json(&json!({ "to": number, "message": message }))
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
