pub mod jwt;
pub mod mfa;
pub mod password;
pub mod recovery_codes;
