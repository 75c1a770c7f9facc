pub mod game_name;
pub mod password;
pub mod username;
