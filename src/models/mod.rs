//! Data models for the library server

pub mod book;
pub mod loan;
pub mod member;
pub mod notification;
pub mod report;
pub mod review;

// Re-export commonly used types
pub use book::Book;
pub use loan::{is_overdue, Loan, LoanStatus, LoanView};
pub use member::{Member, MembershipType};
pub use notification::Notification;
pub use review::Review;
