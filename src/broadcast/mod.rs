pub mod broadcaster;
pub mod registry;

pub use broadcaster::{sse_data_frame, Broadcaster, SSE_HEARTBEAT_FRAME};
pub use registry::{ClientHandle, ConnectionGuard, ConnectionRegistry, Transport};
