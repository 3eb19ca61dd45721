pub mod error;
pub mod value;

pub use error::{PulseError, Result};
pub use value::{Row, Value};
