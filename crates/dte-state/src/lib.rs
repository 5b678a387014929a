//! # dte-state — State Machines
//!
//! - [`submission`]: the per-document outcome state machine the Status
//!   Reconciler drives (`Pending → Sent → {Accepted, AcceptedWithDiscrepancies,
//!   Rejected, NotFound}`, plus the resubmittable `SubmissionFailed`).
//! - [`session`]: the Authority handshake lifecycle and the bearer-token
//!   session it produces.
//!
//! Every state has an `as_str()` name used in storage and logs, and every
//! transition table is an exhaustive `match`.

pub mod session;
pub mod submission;

pub use session::{AuthoritySession, SessionLifecycle, SessionState, SessionTransitionError};
pub use submission::{
    CounterpartyNotice, CounterpartyResponse, Outcome, SubmissionRecord, SubmissionState, TransitionError,
    TransitionRecord,
};
