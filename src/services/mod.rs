pub mod donations;
pub mod stripe;
