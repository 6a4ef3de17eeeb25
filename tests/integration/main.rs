//! Integration test harness.
//!
//! These run on the host and exercise the full accept → session →
//! router → actuator pipeline over in-memory adapters.

mod mock_net;
mod server_tests;
