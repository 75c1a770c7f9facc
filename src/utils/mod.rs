pub mod auth;
pub mod data_validation;
