pub mod x402;

pub use x402::{decode_payment_header, x402_middleware_layer, GateDecision, PaymentGate, PAYMENT_HEADER};
