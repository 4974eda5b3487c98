//! User accounts: registration, login, profile and credential checks.

mod password;
mod service;
mod token;

pub use password::{hash_password, verify_password};
pub use service::{AccountService, LoginToken, Registration};
pub use token::{Claims, TokenConfig, decode_token, issue_token};
