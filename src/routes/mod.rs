pub mod health;
pub mod stocks;
