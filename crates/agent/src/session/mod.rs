#![forbid(unsafe_code)]

mod tracker;

pub use tracker::SessionTracker;
