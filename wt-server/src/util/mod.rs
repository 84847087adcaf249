mod close;
mod lock;
mod spawn;

pub use close::*;
pub use lock::*;
pub use spawn::*;
