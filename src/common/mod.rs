pub mod frame;

pub use frame::{AnnotatedFrame, RawFrame};
