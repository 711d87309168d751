pub mod code;
pub mod index;
pub mod projection;

pub use code::LshCode;
pub use index::LshIndex;
