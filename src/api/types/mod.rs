mod request;
mod response;

pub use request::NotificationsRequest;
pub use response::{AckResponse, NotificationsResponse, Pagination, UnreadCountResponse};
