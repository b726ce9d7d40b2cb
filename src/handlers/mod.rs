// handlers/mod.rs - 3-tier handler layout
//
// Public (no auth) -> Protected (student JWT) -> Elevated (admin JWT)
pub mod elevated; // /api/root/*
pub mod protected; // /api/*
pub mod public; // /, /health
