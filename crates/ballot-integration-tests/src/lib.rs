//! Test support for the Ballot sync engine.
//!
//! [`mock`] hosts an in-process stand-in for the authoritative vote server,
//! faithful to its observable behavior: full-vector pushes over the
//! per-topic WebSocket, vote increments over HTTP, deletes that end the
//! topic's channels. Test-only controls (raw vector pushes, connection
//! kicks, fetch delays, misrouted fetches) exist to provoke the failure
//! paths the sync engine must survive.
//!
//! The end-to-end tests live in `e2e` and run against this mock.

pub mod mock;

#[cfg(test)]
mod e2e;
