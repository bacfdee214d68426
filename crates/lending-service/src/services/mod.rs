pub mod auth_service;
pub mod loan_service;
pub mod notification_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use loan_service::LoanService;
pub use notification_service::{NotificationDispatcher, NotificationWorker};
pub use user_service::UserService;
