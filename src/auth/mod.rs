pub mod secret;
pub mod session;
