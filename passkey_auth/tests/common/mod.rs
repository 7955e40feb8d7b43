pub mod constants;
pub mod fixtures;

pub use fixtures::{TestAuthenticator, TestSetup};
