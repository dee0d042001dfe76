mod walk;

pub use walk::{Discovery, DiscoveryWalker};
