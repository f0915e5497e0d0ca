//! Wire objects and signature helpers shared by the sign-up server, its
//! clients, the payment provider integration and the mailer service.

pub mod config;
pub mod objects;
pub mod signature;
