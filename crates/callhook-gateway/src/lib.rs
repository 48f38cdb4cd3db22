//! # Callhook Gateway
//!
//! HTTP surface for the handlers: document-created events are POSTed by the
//! trigger service, sweeps are POSTed by a scheduler job (or run on the
//! in-process timers started by `callhook serve`).
//!
//! | Route | Auth | Purpose |
//! |---|---|---|
//! | `GET /health` | public | liveness |
//! | `POST /events/notifications` | token | run the notification dispatcher |
//! | `POST /tasks/sweep/{name}` | token | run one retention sweep |
//! | `GET /api/v1/status` | token | policies + sweep history |

pub mod event;
pub mod routes;
pub mod server;

pub use server::{AppState, build_router, serve};
