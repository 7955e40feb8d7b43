/// Relying party used by every ceremony in these tests
pub const RP_ID: &str = "example.test";
pub const ORIGIN: &str = "https://example.test";

/// Authenticator flag bytes
pub const FLAGS_UP: u8 = 0x01;
pub const FLAGS_UP_UV: u8 = 0x05;

pub const TEST_USER_ID: &str = "42";
pub const TEST_USER_HANDLE: &str = "aGFuZGxlLW9mLXVzZXItNDI";
