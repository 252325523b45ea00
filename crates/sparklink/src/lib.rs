//! Control core for agents in networked simulations.
//!
//! sparklink receives sensor messages from a simulator, decodes them, runs a
//! hierarchical behavior selection each cycle, and sends effector commands
//! back, recovering from lost connections on the way.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream transports (TCP, Unix sockets)
//! - [`frame`]: SLIP and length-prefixed message framing
//! - [`sexpr`]: parser for nested parenthesised messages
//! - [`channel`]: input/output channels and the channel manager
//! - [`decision`]: behaviors, the behavior registry and the decision engine
//! - [`agent`]: the cycle driver tying them together

pub mod agent;

/// Re-export transport types.
pub mod transport {
    pub use sparklink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sparklink_frame::*;
}

/// Re-export expression parser types.
pub mod sexpr {
    pub use sparklink_sexpr::*;
}

/// Re-export channel types.
pub mod channel {
    pub use sparklink_channel::*;
}

/// Re-export decision types.
pub mod decision {
    pub use sparklink_decision::*;
}

pub use agent::{ActionMapper, Agent, AgentConfig, AgentError, CycleOutcome, RunSummary, ThoughtModel};
