//! Report assembly.
//!
//! Components, the chart and scratch-directory seams, the schema they fill
//! and the factory that sequences one run.

pub mod case_studies;
pub mod charts;
pub mod components;
pub mod factory;
pub mod markdown;
pub mod schema;
pub mod scratch;

pub use factory::ReportComponentFactory;
pub use markdown::{generate_json_report, generate_markdown_report};
