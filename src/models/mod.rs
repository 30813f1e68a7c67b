pub mod dispense;
pub mod enums;

pub use dispense::*;
pub use enums::*;
