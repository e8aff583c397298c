//! # leadrelay-core
//!
//! Resilient multi-channel data-capture library for the prep-site lead
//! pipeline.
//!
//! This library provides:
//! - A normalized [`Envelope`] model over leads, bonus signups, analytics
//!   events, and page visits
//! - Sink adapters for the independent remote channels (database,
//!   spreadsheet relay, webhook, form relays)
//! - The [`Dispatcher`]: ordered sink attempts with first-success-wins or
//!   broadcast delivery, durable local fallback, and replay
//! - Configuration and logging infrastructure
//!
//! ## Delivery guarantee
//!
//! At-least-one-of-several: an envelope either lands in one of the
//! configured sinks or is appended to the local fallback log and replayed
//! later. Captured events are never silently dropped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use leadrelay_core::{Config, Dispatcher, LeadForm};
//!
//! # async fn capture() -> leadrelay_core::Result<()> {
//! let config = Config::load()?;
//! let dispatcher = Dispatcher::from_config(&config)?;
//!
//! let record = dispatcher
//!     .capture_lead(LeadForm {
//!         first_name: "Ada".into(),
//!         email: "ada@example.com".into(),
//!         package_bought: "full_prep".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("stored as {}", record["id"]);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, DeliveryPolicy};
pub use context::{CaptureContext, HostContext};
pub use dispatcher::{DispatchError, Dispatcher, SinkFailure};
pub use envelope::{Envelope, EnvelopeBuilder, EventPayload, LeadForm, LeadSource};
pub use error::{Error, Result};
pub use replay::{ReplayCoordinator, ReplayReport};
pub use store::{FallbackRecord, FallbackStore};
pub use tracker::PageVisitTracker;

// Public modules
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod replay;
pub mod session;
pub mod sinks;
pub mod store;
pub mod tracker;
