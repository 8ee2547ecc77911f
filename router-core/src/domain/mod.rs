//! # Domain Types
//!
//! The data model shared by every component of the dispatch core: the
//! inbound `Request`/`Response` pair, the long-lived `Endpoint` and
//! `RoutingRule` configuration records, the mode-and-thresholds
//! `OrchestrationRule`, and the comparison artifacts (`APIComparison`,
//! `DiffEntry`) produced off the critical path.
//!
//! Requests and Responses are immutable and live only for the duration
//! of one dispatch. Rules, Endpoints and OrchestrationRules are
//! long-lived process state mutated only through the repositories in
//! [`crate::repository`].

mod comparison;
mod endpoint;
mod orchestration;
mod request;
mod response;
mod rule;

pub use comparison::{APIComparison, DiffEntry, DiffKind};
pub use endpoint::Endpoint;
pub use orchestration::{ComparisonConfig, Mode, OrchestrationRule, TransitionConfig};
pub use request::Request;
pub use response::Response;
pub use rule::RoutingRule;
