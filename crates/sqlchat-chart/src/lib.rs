//! Chart rendering analytics engine for sqlchat
//!
//! The analyst asks the LLM for a [`ChartPlan`], runs the plan's query
//! against the table bound by the connector (exposed to the query as the
//! [`DATA_RELATION`] relation), and rasterizes the result to a PNG under a
//! session-scoped directory.

mod analyst;
mod error;
pub mod plan;
pub mod render;
mod scope;

pub use analyst::{ChartAnalyst, DEFAULT_MAX_RETRIES};
pub use error::ChartError;
pub use plan::{ChartKind, ChartPlan};
pub use render::{render_png, Series};
pub use scope::DATA_RELATION;
