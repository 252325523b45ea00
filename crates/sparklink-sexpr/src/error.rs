/// Reasons an input is rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    /// The input must start with `(` and end with `)`.
    #[error("input not enclosed in parentheses")]
    NotEnclosed,

    /// End of input reached with lists still open.
    #[error("unbalanced input: {open} list(s) left open")]
    Unbalanced { open: usize },

    /// A `)` with no matching `(`.
    #[error("unexpected ')' at offset {offset}")]
    UnexpectedClose { offset: usize },

    #[error("input is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
