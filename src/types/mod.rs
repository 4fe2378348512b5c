pub mod app_state;
pub mod signal;

pub use app_state::{AppStateSyncKeyData, AppStateSyncKeyFingerprint, LtHashState, ValueMac};
pub use signal::{CREDS_KEY, KeyCategory, KeyPair, SignalDataSet, SignalValue};
