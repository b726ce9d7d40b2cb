// handlers/elevated/mod.rs - Elevated handlers (admin JWT required)
//
// Route prefix: /api/root/*. `require_admin` runs before every handler here.
pub mod peer_group;
