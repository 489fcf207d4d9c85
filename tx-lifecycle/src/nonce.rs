pub use tracker::{NonceDetails, NonceLock, NonceTracker};

mod tracker;

#[cfg(test)]
mod tests;
