//! Cross-component scenarios over the in-memory and TCP transports.

#[cfg(test)]
pub(crate) mod fixtures;

mod churn;
mod seed_crawl;
mod tcp;
