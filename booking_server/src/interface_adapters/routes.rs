use crate::interface_adapters::handlers::{
    delete_booking, login, ping, search_bookings, search_bookings_post, update_context,
};
use crate::interface_adapters::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/login", post(login))
        .route("/bookings", get(search_bookings).post(search_bookings_post))
        .route("/bookings/{public_id}", delete(delete_booking))
        .route("/bookings/{public_id}/context", post(update_context))
        .with_state(state)
}
