/// Session code generation.
pub mod codes;
/// OpenAPI documentation generation.
pub mod documentation;
/// Notification fanout brokers.
pub mod fanout;
/// Event catalog and publication helpers.
pub mod fanout_events;
/// Orchestration between engine, fanout, and scheduler.
pub mod game_flow;
/// Core game engine operating on stored sessions.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Single-shot phase timers.
pub mod scheduler;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage reconnect supervisor.
pub mod storage_supervisor;
