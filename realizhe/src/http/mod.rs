//! HTTP layer: Axum router, handlers, and responses.
//!
//! JSON endpoints under `/api` for the storefront (products, cart, auth,
//! orders and custom plans) plus the printable catalog page at `/catalogo`.

mod auth;
mod catalog_page;
mod error;
mod handlers;
mod responses;
mod state;


pub use handlers::router;
pub use state::{AppState, SessionStore};
