pub mod handlers;
pub mod items;
pub mod stock;
pub mod transactions;


pub use stock::{settle, StockChange, StockEffect, StockPlan, StockShortfall};
