pub mod payment;
pub mod response;
pub mod tier;

pub use payment::*;
pub use response::*;
pub use tier::*;
