pub mod game_events;
pub mod game_manager;
pub mod game_socket_service;
pub mod round_coordinator;
pub mod session;
