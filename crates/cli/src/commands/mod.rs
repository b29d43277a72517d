pub mod collect;
pub mod results;
pub mod util;
pub mod vcrash;

pub use collect::*;
pub use results::*;
pub use util::*;
pub use vcrash::*;
