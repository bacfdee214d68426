//! Generated Protocol Buffer and gRPC code for the lending platform.
//!
//! This crate contains the compiled `lending.v1` definitions shared by the
//! service and its clients.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // Generated code has various doc formatting

// Re-export prost traits for convenience
pub use prost::Message;

pub mod lending {
    //! Public auth, user and loan RPCs
    tonic::include_proto!("lending.v1");
}
