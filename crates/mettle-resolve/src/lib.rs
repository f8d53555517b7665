//! Repository mapping, score-client composition and the concurrent
//! resolution engine.

mod client;
mod engine;
mod generator;
mod mapper;

pub use client::{CachedClient, GeneratorClient, StoreClient};
pub use engine::{Progress, ResolutionEngine};
pub use generator::{DEFAULT_API_URL, HttpGenerator};
pub use mapper::{HintMapper, HostMapper, MultiMapper, StoreMapper};
