use actix_web::web;

use crate::{
    models::BookingRow,
    notify,
    state::{AppState, BookingEvent},
};

pub mod admin;
pub mod events;
pub mod finance;
pub mod pro;
pub mod public;

/// Fans a booking change out to SSE subscribers and, in the background, to
/// the shop's notification channels. Delivery failures never fail the request.
pub(crate) fn broadcast_and_notify(state: &web::Data<AppState>, kind: &str, row: BookingRow) {
    let event = BookingEvent::from_row(kind, row);
    let _ = state.events.send(event.clone());
    let notify_state = state.get_ref().clone();
    actix_web::rt::spawn(async move {
        notify::booking_event(&notify_state, &event).await;
    });
}
