pub mod amount;
pub mod item;
pub mod ledger;
pub mod payment;
pub mod transaction;
pub mod user;

pub use item::Item;
pub use ledger::CustomerLedger;
pub use payment::{AccountPayment, PaymentType};
pub use transaction::{Transaction, TransactionKind};
pub use user::User;
