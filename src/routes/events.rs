use actix_web::{http::header, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{
    auth::{basic_validator, AuthUser},
    state::{AppState, BookingEvent},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/admin/events")
            .wrap(HttpAuthentication::basic(basic_validator))
            .route(web::get().to(stream_shop_events)),
    )
    .service(
        web::resource("/api/bookings/{id}/events").route(web::get().to(stream_booking_events)),
    );
}

fn event_to_bytes(event: &BookingEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: update\ndata: {}\n\n", payload))
}

/// Live feed for the back-office agenda, limited to the caller's shop.
async fn stream_shop_events(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> HttpResponse {
    let shop_id = auth.barbershop_id.clone();
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) => event,
            Err(_) => return None,
        };
        if shop_id.as_deref() != Some(event.barbershop_id.as_str()) {
            return None;
        }
        Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event)))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

#[derive(serde::Serialize)]
struct PublicBookingEvent {
    booking_id: String,
    status: String,
    date: String,
    start_minute: i64,
    service_name: Option<String>,
    professional_name: Option<String>,
}

/// Unauthenticated status feed for a single booking, so the confirmation page
/// can react when the shop confirms or cancels. Only non-sensitive fields.
async fn stream_booking_events(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let booking_id = path.into_inner();
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) => event,
            Err(_) => return None,
        };
        if event.booking_id != booking_id {
            return None;
        }
        let public = PublicBookingEvent {
            booking_id: event.booking_id,
            status: event.status,
            date: event.date,
            start_minute: event.start_minute,
            service_name: event.service_name,
            professional_name: event.professional_name,
        };
        let payload = serde_json::to_string(&public).unwrap_or_else(|_| "{}".to_string());
        Some(Ok::<web::Bytes, actix_web::Error>(web::Bytes::from(
            format!("event: update\ndata: {}\n\n", payload),
        )))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}
