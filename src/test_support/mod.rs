pub mod fixture;
pub mod http_server;
