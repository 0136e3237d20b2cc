//! Fanout of images from the producer to consumers

pub mod broadcaster;

pub use broadcaster::{Broadcaster, FanoutReport};
