pub mod client_secret;
pub mod oauth;
pub mod session;
pub mod token;
pub mod token_store;

pub use client_secret::{ClientKind, OAuthClient};
pub use oauth::LoginOutcome;
pub use session::Session;
pub use token::TokenSet;
pub use token_store::FileTokenStore;
