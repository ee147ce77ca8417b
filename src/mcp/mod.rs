pub mod line_gate;
pub mod server;
pub mod transport;
