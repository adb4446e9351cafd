pub mod pending_two_factor;
pub mod recovery_code;
pub mod refresh_token;
pub mod session;
pub mod user;

pub use pending_two_factor::PendingTwoFactor;
pub use recovery_code::RecoveryCode;
pub use refresh_token::AuthRefreshToken;
pub use session::AuthSession;
pub use user::User;
