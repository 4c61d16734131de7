pub mod pm2;
pub mod ports;
pub mod traits;

pub use pm2::Pm2ProcessManager;
pub use ports::{detect_inspector, LsofInspector, NetstatInspector};
pub use traits::{ManagedProcess, PortInspector, PortMap, ProcessManager};
