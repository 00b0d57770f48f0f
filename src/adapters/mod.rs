// Adapters layer: concrete implementations of the marketplace port.

pub mod mercari;

pub use mercari::{MercariClient, MercariClientConfig};
