pub mod errors;
pub mod storage;
pub mod todo;

pub use errors::*;
pub use storage::*;
pub use todo::*;
