/// Errors raised while resolving or driving behaviors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// A policy or selector named a behavior the registry does not hold.
    #[error("unknown behavior '{0}'")]
    UnknownBehavior(String),

    #[error("behavior '{0}' is already registered")]
    DuplicateBehavior(String),

    /// A composite's default child must be registered before the composite.
    #[error("composite '{composite}' refers to unknown default child '{child}'")]
    UnknownDefaultChild { composite: String, child: String },

    /// A composite selected itself, directly or through its children.
    #[error("composite '{0}' selects itself")]
    SelectionCycle(String),
}

pub type Result<T> = std::result::Result<T, DecisionError>;
