//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! event store and the device tables.

pub mod device;
pub mod event;

pub use device::{DeviceRepository, TelemetryTarget};
pub use event::EventRepository;
