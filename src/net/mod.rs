pub mod client;
pub mod http;
pub mod payload;
pub mod response;
pub mod transport;
