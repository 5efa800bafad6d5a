//! Server test suite: handler tests over in-memory SQLite plus end-to-end
//! surface tests that boot the real listeners.

mod common;
mod handlers;
mod surfaces;
