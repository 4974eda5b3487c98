pub mod account;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use serde::Serialize;

/// Plain acknowledgement body.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}
