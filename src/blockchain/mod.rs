// src/blockchain/mod.rs

// Registry-driven HTTP execution
pub mod executor;
pub mod registry;

// JSON-RPC against the Ethereum node
pub mod methods;
pub mod node_client;
pub mod provider;
pub mod queries;

pub use node_client::NodeClient;
pub use provider::EthereumProvider;
pub use registry::MethodRegistry;
