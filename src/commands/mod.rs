pub mod auth;
pub mod cache;
pub mod crawl;
pub mod export;
