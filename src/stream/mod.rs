pub mod direction;
pub mod endpoint;
#[allow(clippy::module_inception)]
pub mod stream;

pub use direction::{Direction, DirectionSelection};
pub use endpoint::EndpointFilter;
pub use stream::{Stream, candidate_streams};
