// Domain layer: booking records, admin credentials and the pure rules around them.

pub mod entities;
pub mod errors;
pub mod lockout;
pub mod normalizer;
pub mod ports;
pub mod query;
pub mod token;

pub use entities::{BookingRecord, QueryFilter, SearchPage, SearchRequest, StoredResource};
pub use errors::{AuthError, BookingError, StoreError, TokenError};
pub use ports::{Clock, DocumentStore};
