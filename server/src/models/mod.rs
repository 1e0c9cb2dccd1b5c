pub mod game;
pub mod game_round;
pub mod player;
pub mod response;
