//! # Gatewayエンドポイント

pub mod create_token;
pub mod debug_env;
pub mod issuer;
pub mod ping;

pub use create_token::handle_create_token;
pub use debug_env::handle_debug_env;
pub use issuer::handle_issuer;
pub use ping::handle_ping;
