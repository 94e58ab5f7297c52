// Roomlog server library: HTTP API, process bootstrap and shared state

pub mod api; // HTTP handlers and routes
pub mod model; // Configuration loading and application state
pub mod startup; // Listeners, logging and shutdown
