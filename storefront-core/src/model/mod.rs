pub mod booking;
pub mod order;

pub use booking::{BookingRequest, ValidBooking};
pub use order::{Order, OrderStatus};
