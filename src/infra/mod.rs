pub mod asset_client;
pub mod discovery;
pub mod playback;
pub mod provider_set;
pub mod static_chain;
pub mod upload;
