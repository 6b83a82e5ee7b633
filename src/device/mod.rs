mod reader;
mod source;
mod stream;

#[cfg(test)]
mod tests;

pub use reader::{DeviceReader, ReaderExit, ReaderOutcome};
pub use source::{ChannelSource, DeviceFile, MotionSource, ReadSource};
pub use stream::{derive_device_ids, DeviceRegistry, DeviceStream};
