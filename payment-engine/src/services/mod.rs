pub mod lifecycle;

pub use lifecycle::{CreatePaymentRequest, PaymentService};
