pub mod authorize;
pub mod delete_booking;
pub mod login;
pub mod search_bookings;
pub mod update_context;

#[cfg(test)]
pub(crate) mod test_support;
