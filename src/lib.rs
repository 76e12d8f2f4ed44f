//! Config-driven structured data extraction from HTML.
//!
//! A ruleset — a JSON tree of path selectors, cleanup directives and value
//! transformations — is walked in lockstep with a parsed HTML document to
//! produce a JSON value tree:
//! - selectors locate nodes; matched subtrees can be pruned in place first
//! - a capability-typed transformation chain refines each matched value
//! - a multi-site dispatcher picks the ruleset whose URL pattern matches
//!
//! The crate never fetches pages; HTML and rulesets arrive as text.

pub mod config;
pub mod dom;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod multi;
pub mod transformations;

pub use config::{ConfigSection, Params, TransformationConfig};
pub use error::Error;
pub use extractor::StructuredDataExtractor;
pub use multi::MultiExtractor;
