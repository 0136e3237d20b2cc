//! Device configuration shared between the camera and the control app

pub mod document;
pub mod store;

pub use document::{ConfigPatch, DeviceConfig};
pub use store::DeviceConfigStore;
