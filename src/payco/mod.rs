pub mod auth;
pub mod client;

pub use auth::TokenCache;
pub use client::{
    map_status, ApprovedPayment, CardPaymentRequest, DeclinedPayment, MethodDetails,
    PaycoClient, PaycoCredentials, PaymentOutcome, RefundOutcome, StatusProbe,
};
