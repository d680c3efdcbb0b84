//! Notification pipeline workers and the history read path.
//!
//! - [`enrichment`] turns comment activity into notification jobs
//! - [`fanout`] resolves destination accounts and delivers
//! - [`approvals`] mirrors author → app delegations and answers fan-out queries
//! - [`events`] stores delivered notifications
//! - [`history`] groups and paginates stored events for clients

pub mod approvals;
pub mod enrichment;
pub mod events;
pub mod fanout;
pub mod history;
pub mod profiles;

#[cfg(test)]
mod testing;
