pub mod card;
pub mod store;
pub mod transaction;

pub use card::{detect_brand, validate_card, CardBrand, CardData, CardSnapshot};
pub use store::{CreditCardSettings, MethodSettings, PaymentMethods, StoreConfig, StoreUpdate};
pub use transaction::{
    format_major_units, Customer, PaymentMethod, PaymentStatus, Transaction, TransactionEvent,
};
