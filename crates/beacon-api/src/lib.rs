mod client;
mod mock;

pub use client::ApiClient;
pub use mock::MockTransport;
