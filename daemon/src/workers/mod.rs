pub mod deployer;
pub mod pool;
pub mod queue;
pub mod registry;

pub use deployer::WorkerContext;
pub use pool::WorkerPool;
pub use queue::DeploymentQueue;
pub use registry::ActiveRegistry;
