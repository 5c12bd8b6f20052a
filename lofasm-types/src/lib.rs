pub mod channel;
pub mod encoding;
pub mod epoch;
pub mod error;
pub mod metadata;

pub use channel::*;
pub use encoding::*;
pub use epoch::*;
pub use error::*;
pub use metadata::*;
