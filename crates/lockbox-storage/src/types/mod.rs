//! Domain types shared by the server and the storage backends.

mod entries;
mod ids;
mod users;

pub use entries::*;
pub use ids::*;
pub use users::*;
