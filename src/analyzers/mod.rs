//! Cross-dataset analysis and report assembly.
//!
//! This module joins the spatial results (catchments, connectivity) with the
//! temporal series (ridership, performance, commute flows) into the summary
//! records the report artifacts are built from.

pub mod report;
pub mod types;
pub mod utility;
