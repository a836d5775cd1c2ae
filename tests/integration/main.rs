//! Integration tests: the engine wired together against a mock bridge.

mod mock_bridge;
mod scenarios;
