pub mod prompt;
pub mod user;

pub use prompt::*;
pub use user::*;
