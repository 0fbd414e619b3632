//! Letter lifecycle and delayed delivery.
//!
//! A letter moves `draft → scheduled → locked → delivered` and never back.
//! [`LetterService`] owns the user-facing transitions; [`Dispatcher`] runs
//! the periodic sweep that closes expired edit windows and hands due
//! letters to the notification gateway.

pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod recipients;

pub use dispatcher::{DeliveryOutcome, Dispatcher, DispatcherConfig, SweepReport, run_sweep_loop};
pub use error::{DeliveryError, LetterError};
pub use lifecycle::{EditOutcome, LetterService};
