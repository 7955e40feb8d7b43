mod config;
mod memory;
mod postgres;
mod sqlite;
mod store_type;

pub use store_type::{
    CredentialStore, InMemoryCredentialStore, PostgresCredentialStore, SqliteCredentialStore,
};
