//! Registry of anchoring chains
//!
//! One generic registry, keyed by the chain's native identifier: numeric
//! chain ids for EVM chains, strings for the others. A registry is built
//! once and handed to whoever needs chain lookups.

use crate::error::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Capabilities every chain definition exposes
pub trait ChainSpec {
    /// Native chain identifier
    type Id: Clone + Eq + Hash + Debug + Display;

    /// Chain identifier
    fn id(&self) -> &Self::Id;

    /// Network name (e.g. "mainnet", "sepolia")
    fn name(&self) -> &str;

    /// Whether the chain is a test network
    fn is_testnet(&self) -> bool;
}

/// EVM chain, identified by its numeric chain id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmChain {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Network name
    pub name: String,
    /// Test network flag
    #[serde(default)]
    pub testnet: bool,
}

impl EvmChain {
    /// Create an EVM chain
    pub fn new(chain_id: u64, name: impl Into<String>, testnet: bool) -> Self {
        Self {
            chain_id,
            name: name.into(),
            testnet,
        }
    }
}

impl ChainSpec for EvmChain {
    type Id = u64;

    fn id(&self) -> &u64 {
        &self.chain_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_testnet(&self) -> bool {
        self.testnet
    }
}

/// Non-EVM chain, identified by a string id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedChain {
    /// Chain id
    pub id: String,
    /// Network name
    pub name: String,
    /// Test network flag
    #[serde(default)]
    pub testnet: bool,
}

impl ChainSpec for NamedChain {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_testnet(&self) -> bool {
        self.testnet
    }
}

/// Immutable chain lookup table
#[derive(Clone, Debug)]
pub struct ChainRegistry<C: ChainSpec> {
    chains: HashMap<C::Id, C>,
    by_name: HashMap<String, C::Id>,
}

impl<C: ChainSpec> ChainRegistry<C> {
    /// Build a registry; ids and names must be unique
    pub fn new(chains: impl IntoIterator<Item = C>) -> TypesResult<Self> {
        let mut registry = Self {
            chains: HashMap::new(),
            by_name: HashMap::new(),
        };
        for chain in chains {
            if registry.chains.contains_key(chain.id()) {
                return Err(TypesError::DuplicateChain(chain.id().to_string()));
            }
            if registry.by_name.contains_key(chain.name()) {
                return Err(TypesError::DuplicateChain(chain.name().to_string()));
            }
            registry
                .by_name
                .insert(chain.name().to_string(), chain.id().clone());
            registry.chains.insert(chain.id().clone(), chain);
        }
        Ok(registry)
    }

    /// Get chain by id
    pub fn get(&self, id: &C::Id) -> Option<&C> {
        self.chains.get(id)
    }

    /// Get chain by network name
    pub fn by_name(&self, name: &str) -> Option<&C> {
        self.by_name.get(name).and_then(|id| self.chains.get(id))
    }

    /// Get chain by network name, failing when unknown
    pub fn require(&self, name: &str) -> TypesResult<&C> {
        self.by_name(name)
            .ok_or_else(|| TypesError::UnknownChain(name.to_string()))
    }

    /// Iterate over registered chains (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &C> {
        self.chains.values()
    }

    /// Number of chains
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl ChainRegistry<EvmChain> {
    /// EVM networks the storage contract is deployed on
    pub fn evm_defaults() -> Self {
        let chains = [
            EvmChain::new(1, "mainnet", false),
            EvmChain::new(11_155_111, "sepolia", true),
            EvmChain::new(100, "xdai", false),
            EvmChain::new(137, "matic", false),
            EvmChain::new(1337, "private", true),
        ];
        let mut registry = Self {
            chains: HashMap::new(),
            by_name: HashMap::new(),
        };
        for chain in chains {
            registry.by_name.insert(chain.name.clone(), chain.chain_id);
            registry.chains.insert(chain.chain_id, chain);
        }
        registry
    }
}
