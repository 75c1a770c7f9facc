pub mod account;
pub mod game;
pub mod play_history;
pub mod review;
