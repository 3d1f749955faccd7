pub mod dense;
pub mod discriminator;
pub mod gan;
pub mod generator;
pub mod network;

// Re-export the main types needed by other modules
pub use gan::{Gan, NetworkConfig};
pub use network::AdversarialNetwork;
