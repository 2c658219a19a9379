//! Shared fixtures for data-access integration tests

#![allow(dead_code)]

use reqnet_data_access::{
    Collaborators, DataAccess, DataAccessConfig, MemoryChain, MemoryContentStore, SubmitRequest,
};
use reqnet_primitives::{ChannelId, Topic, H256};
use reqnet_types::{ChainRegistry, IdentityType, Signature, SignatureMethod, SignedPayload};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fast retries, no jitter
pub fn test_config() -> DataAccessConfig {
    let mut config = DataAccessConfig::default();
    config.retry.max_retries = 3;
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 4;
    config.retry.jitter = false;
    config.confirmation_poll_ms = 5;
    config
}

pub struct Harness {
    pub access: DataAccess,
    pub content: Arc<MemoryContentStore>,
    pub chain: Arc<MemoryChain>,
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: DataAccessConfig) -> Harness {
    init_tracing();
    let (collaborators, content, chain) = Collaborators::in_memory();
    let access = DataAccess::new(config, &ChainRegistry::evm_defaults(), collaborators)
        .expect("valid test config");
    Harness {
        access,
        content,
        chain,
    }
}

pub fn channel(n: u8) -> ChannelId {
    ChannelId::new(H256::from_bytes([n; 32]))
}

pub fn topic(n: u8) -> Topic {
    let mut bytes = [0u8; 32];
    bytes[31] = n;
    Topic::new(H256::from_bytes(bytes))
}

pub fn signature() -> Signature {
    Signature::new(SignatureMethod::Ecdsa, IdentityType::EthereumAddress, "0xsig")
}

pub fn request(channel_id: ChannelId, data: &str) -> SubmitRequest {
    SubmitRequest {
        channel_id,
        payload: SignedPayload::clear(data, signature()),
        topics: vec![],
    }
}

/// Request action payload; `nonce` keeps repeated actions distinct
pub fn action(name: &str, nonce: u64) -> String {
    format!(r#"{{"name":"{}","parameters":{{"nonce":{}}}}}"#, name, nonce)
}
