pub mod hashing;
pub mod user;
