pub mod checkin;
pub mod metadata;
pub mod route;
pub mod voucher;
