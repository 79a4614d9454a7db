pub mod packet_kind;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod policy;

pub use packet_kind::PacketKind;
pub use pipeline::{DecryptPipeline, PipelineError, RunSummary};
pub use policy::{MalformedPolicy, Policies, StreamlessPolicy, UnknownPolicy};
