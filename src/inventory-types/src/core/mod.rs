pub mod namespace;
pub mod secret;
