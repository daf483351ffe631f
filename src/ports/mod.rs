pub mod activity;
pub mod database;
pub mod member;
pub mod rate_limit;
