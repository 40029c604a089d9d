//! 命令定义和实现

pub mod decode;
pub mod modes;
pub mod simulate;

pub use decode::DecodeCommand;
pub use simulate::SimulateCommand;
