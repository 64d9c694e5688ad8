mod capabilities;
mod id;
mod node_status;
mod session;

pub use capabilities::{BROWSER_NAME_KEY, Capabilities, Stereotype};
pub use id::{NodeId, SessionId};
pub use node_status::{Availability, NodeStatus};
pub use session::SessionRecord;
