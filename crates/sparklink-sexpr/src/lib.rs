//! S-expression parsing for simulator messages.
//!
//! A perception message is a sequence of parenthesised lists such as
//! `(time (now 51.82))(GS (t 0.00) (pm BeforeKickOff))`. [`parse`] turns it
//! into an [`ExprNode`] whose children are the top-level lists.

pub mod error;
pub mod node;
pub mod parser;

pub use error::{ParseError, Result};
pub use node::{Expr, ExprNode};
pub use parser::{parse, parse_bytes};
