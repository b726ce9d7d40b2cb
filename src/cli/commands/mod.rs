pub mod groups;
pub mod server;
pub mod token;
