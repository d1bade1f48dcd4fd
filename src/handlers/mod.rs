pub mod content;
pub mod health;
pub mod info;

pub use content::*;
pub use health::*;
pub use info::*;

use crate::middleware::PaymentGate;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<PaymentGate>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gate: Arc<PaymentGate>) -> Self {
        Self {
            gate,
            started_at: Instant::now(),
        }
    }

    pub fn verification_label(&self) -> &'static str {
        self.gate.verifier_name()
    }
}

pub const SERVER_NAME: &str = "Onekgman";
