//! Services that write to the document store.
//!
//! Both services are cheap to clone and share one store and one configuration.

pub mod record_templates;
pub mod users;
