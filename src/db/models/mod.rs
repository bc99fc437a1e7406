mod alert;
mod finance;
mod obligation;

pub use alert::*;
pub use finance::*;
pub use obligation::*;
