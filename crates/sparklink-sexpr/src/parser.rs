use crate::error::{ParseError, Result};
use crate::node::{Expr, ExprNode};

/// Parse a message into a tree whose children are its top-level lists.
///
/// Tokens are separated by whitespace or parentheses. The input must be
/// non-empty, enclosed in parentheses and balanced.
pub fn parse(input: &str) -> Result<ExprNode> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return Err(ParseError::NotEnclosed);
    }

    // Bottom entry is the root; every '(' opens a new frame on top.
    let mut stack: Vec<ExprNode> = vec![ExprNode::default()];
    let mut token_start: Option<usize> = None;

    for (offset, ch) in input.char_indices() {
        let is_delimiter = ch == '(' || ch == ')' || ch.is_whitespace();
        if !is_delimiter {
            token_start.get_or_insert(offset);
            continue;
        }

        if let Some(start) = token_start.take() {
            push_child(&mut stack, Expr::Leaf(input[start..offset].to_string()));
        }

        match ch {
            '(' => stack.push(ExprNode::default()),
            ')' => {
                if stack.len() < 2 {
                    return Err(ParseError::UnexpectedClose { offset });
                }
                if let Some(done) = stack.pop() {
                    push_child(&mut stack, Expr::Node(done));
                }
            }
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::Unbalanced {
            open: stack.len() - 1,
        });
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Parse raw bytes, rejecting anything that is not UTF-8.
pub fn parse_bytes(input: &[u8]) -> Result<ExprNode> {
    parse(std::str::from_utf8(input)?)
}

fn push_child(stack: &mut [ExprNode], child: Expr) {
    if let Some(top) = stack.last_mut() {
        top.push(child);
    }
}
