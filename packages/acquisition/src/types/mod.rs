//! Data model for the acquisition pipeline.

pub mod cache;
pub mod corpus;
pub mod decision;
pub mod fetch;
pub mod link;
pub mod site;
