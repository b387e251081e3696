//! Vaultline bootstrap
//!
//! Orchestration layer for first-time / recovery setup of end-to-end
//! encrypted messaging: cross-signing identity, secret-storage container,
//! online key backup, and the trust-signing of the backup descriptor.
//!
//! # Architecture
//!
//! The external crypto engine reports bootstrap progress as a fixed
//! vocabulary of states. [`BootstrapSession`] maps each reported state
//! through a total decision table ([`decide`]) to either a silent engine
//! transition or an observable pause, and owns everything around that:
//! the recovery-secret lifecycle, the acknowledgment gate, transport
//! readiness, post-success finalization, and the backup trust signature.
//!
//! # Components
//!
//! - [`BootstrapSession`]: the live orchestration state machine
//! - [`decide`] / [`Decision`]: state-to-decision dispatch table
//! - [`Phase`]: observable phase the presentation shell renders
//! - [`UiSignal`]: consumed-once pending UI action
//! - [`sign_and_republish`]: key-backup trust signer
//! - [`UiaRelay`]: step-up authentication challenge relay

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod decision;
mod phase;
mod session;
mod signal;
mod signer;
mod uia;

pub use decision::{Decision, EngineCall, decide};
pub use phase::{FieldError, Phase};
pub use session::{BootstrapSession, SessionConfig};
pub use signal::UiSignal;
pub use signer::{TrustSignError, sign_and_republish};
pub use uia::{UiaOutcome, UiaRelay};
