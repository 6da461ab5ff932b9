pub mod ring;

pub use ring::{RingHistory, Snapshot};
