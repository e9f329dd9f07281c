pub use post::*;
pub use user::*;

mod post;
mod user;
