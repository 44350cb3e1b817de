pub mod accumulator;
pub mod metrics;
pub mod normalizer;
pub mod parser;
pub mod reconciler;
pub mod scheduler;
pub mod sync;
pub mod xtream;
