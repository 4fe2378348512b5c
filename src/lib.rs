pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod service;
pub mod types;

pub use codec::Buffer;
pub use config::MySqlAuthConfig;
pub use error::SessionError;
pub use service::{AuthCreds, AuthState, MySqlAuthState, use_mysql_auth_state};
pub use types::{KeyCategory, SignalDataSet, SignalValue};
