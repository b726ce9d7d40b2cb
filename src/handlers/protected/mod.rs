// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route prefix: /api/*. Every handler receives the caller as `AuthUser`.
pub mod peer_group;
