//! Injected backend seams
//!
//! The recording pipeline never touches hardware or a concrete filesystem
//! directly. Storage and media access go through the traits defined here,
//! so hosts can plug in their own implementations.

pub mod fs;
pub mod media;
pub mod memory;
pub mod storage;

pub use fs::FsStorage;
pub use media::{
    AcquireError, AudioDeviceInfo, CaptureStream, DeviceKind, MediaBackend, TrackEvent,
};
pub use memory::MemoryStorage;
pub use storage::StorageBackend;
