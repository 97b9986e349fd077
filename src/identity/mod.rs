pub mod domain;
pub mod qr;
pub mod repository;

pub use domain::{IdentityError, Username};
pub use repository::{NewIdentity, ProfileUpdate};
