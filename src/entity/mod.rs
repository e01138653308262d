pub mod audit_logs;
pub mod favorites;
pub mod listings;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use favorites::Entity as Favorites;
pub use listings::Entity as Listings;
pub use users::Entity as Users;
