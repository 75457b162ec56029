//! Run commands locally or on a remote host over SSH, stream their output line
//! by line, and place files on the remote host with the scp sink handshake.
//!
//! See [`exec`] for the building blocks and [`exec::Runner`] for the façade
//! that provisioning code usually starts from.

pub mod exec;
