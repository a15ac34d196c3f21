//! External API integrations

pub mod index_provider;
pub mod position;

pub use index_provider::{
    HttpIndexProvider, IndexRequest, ProviderError, StaticIndexProvider, VegetationIndexProvider,
};
pub use position::{ChannelPositionSource, PositionError, PositionFeed, PositionSource};
