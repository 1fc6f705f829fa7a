//! Integration tests: full monitor cycles against in-memory and
//! mock-HTTP upstreams.

mod mock_upstream;
mod pipeline;
mod push_channel;
