//! Wire types shared by the storefront BFF and its clients.
//!
//! - [`error`]: the normalized error taxonomy every proxy call and every
//!   client call reports failures in.
//! - [`envelope`]: helpers for the upstream `{status, message, errors}` shape.
//! - [`auth`]: login/registration payloads and the opaque session values.
//! - [`catalog`]: sanitized rooms, hotels and locations.

pub mod auth;
pub mod catalog;
pub mod envelope;
pub mod error;

pub use auth::AuthToken;
pub use auth::LoginRequest;
pub use auth::LoginSuccess;
pub use auth::Registration;
pub use auth::RegistrationSuccess;
pub use auth::UserRecord;
pub use catalog::DataEnvelope;
pub use catalog::Feature;
pub use catalog::Hotel;
pub use catalog::Location;
pub use catalog::ResourceId;
pub use catalog::Room;
pub use error::ErrorBody;
pub use error::ErrorKind;
pub use error::NormalizedError;
