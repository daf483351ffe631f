pub mod activity;
pub mod database;
pub mod rate_limit;
