pub mod fetch;
pub mod pdf;
