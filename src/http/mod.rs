//! HTTP edge (C17): the axum server exposing `spec.md` §6's endpoints.
//! Grounded in `other_examples/manifests/{fourthplaces-mntogether,
//! sideseat-sideseat}/Cargo.toml`'s axum+tower-http pairing (SPEC_FULL.md
//! AMBIENT.5) — the teacher itself only ever plays HTTP *client*
//! (`src/api.rs`'s `make_api_request`), so this module's request/response
//! envelope shape is this crate's own, not copied line-for-line from
//! anywhere in `src-tauri`.

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
