//! Foundation utilities shared by the host and the client

pub mod logging;
