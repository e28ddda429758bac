pub mod lead;
pub mod principal;
pub mod quote;
