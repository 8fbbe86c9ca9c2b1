//! Instrumentation runtime for tinytrace.
//!
//! This crate provides:
//! - The [`Frame`] traced functions report their variables through
//! - The program registry populated by `#[program]`
//! - Sessions that run a program under the analysis engine
//! - Raw observation logs for after-the-fact analysis

pub mod frame;
pub mod recording;
pub mod registry;
pub mod session;

pub use frame::Frame;
pub use recording::ObservationLog;
pub use registry::{find_program, iter_programs, lookup_program, program_count, ProgramRegistration};
pub use session::{Session, SessionConfig};

// Used by code generated from `#[program]`.
#[doc(hidden)]
pub use linkme;
