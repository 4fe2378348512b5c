pub mod auth_state;
pub mod session_data;

pub use auth_state::{AuthCreds, AuthState, MySqlAuthState, SignalKeyStore, use_mysql_auth_state};
pub use session_data::SessionData;
