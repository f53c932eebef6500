pub mod value;
pub mod histogram;
pub mod factory;
pub mod registry;
pub mod post;

pub use factory::AggregatorFactory;
pub use registry::{AggregatorRegistry, AggregatorSpec};
pub use value::Value;
