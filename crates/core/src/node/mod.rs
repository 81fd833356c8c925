//! Ring members: the polymorphic operation set, the local engine, the
//! remote proxy and the pool that interns them.

mod handle;
pub use handle::NodeHandle;
pub use handle::Peer;
mod local;
pub use local::LocalNode;
mod remote;
pub use remote::RemoteNode;
mod pool;
pub use pool::NodePool;
pub use pool::NodePoolBuilder;
