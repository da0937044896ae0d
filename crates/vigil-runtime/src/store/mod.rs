mod postgres;

pub use postgres::{ElectionConfig, PgStore};
