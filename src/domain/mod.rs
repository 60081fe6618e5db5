pub mod context;
pub mod display;
pub mod models;
pub mod session;
pub mod settings;
pub mod state_machine;
