// Consumer engine
pub mod consumer;

// Health endpoint
pub mod handlers;
pub mod routes;

// Stream log client library
pub mod stream_log;

// Logging setup shared by the binaries
pub mod telemetry;
