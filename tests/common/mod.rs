//! Integration test common infrastructure.
//!
//! Spawns real `impush` processes against a temp config and drives them
//! over HTTP, so the send -> bus -> fanout -> merger -> pusher pipeline is
//! exercised the way a deployed process actually runs it.

pub mod server;

pub use server::TestServer;
