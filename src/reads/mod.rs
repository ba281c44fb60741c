use std::fmt;

pub mod protoread;
pub mod rad_read;

pub use protoread::{AuxSegments, ProtoRead};
pub use rad_read::{FastqEntry, RadRead};

/// One side of a paired-end read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mate {
    P5,
    P7,
}

impl Mate {
    pub const BOTH: [Mate; 2] = [Mate::P5, Mate::P7];

    pub fn index(&self) -> usize {
        match self {
            Mate::P5 => 0,
            Mate::P7 => 1,
        }
    }
}

impl fmt::Display for Mate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mate::P5 => write!(f, "p5"),
            Mate::P7 => write!(f, "p7"),
        }
    }
}
