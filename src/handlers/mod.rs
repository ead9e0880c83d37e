// Handlers module

pub mod health;

pub use health::health_handler;
