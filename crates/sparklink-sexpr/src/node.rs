use std::fmt;

use serde::Serialize;

/// One element of a list: a bare token or a nested list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Expr {
    Leaf(String),
    Node(ExprNode),
}

impl Expr {
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            Expr::Leaf(token) => Some(token),
            Expr::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&ExprNode> {
        match self {
            Expr::Leaf(_) => None,
            Expr::Node(node) => Some(node),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Leaf(_))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Leaf(token) => f.write_str(token),
            Expr::Node(node) => write!(f, "({node})"),
        }
    }
}

impl From<&str> for Expr {
    fn from(token: &str) -> Self {
        Expr::Leaf(token.to_string())
    }
}

impl From<ExprNode> for Expr {
    fn from(node: ExprNode) -> Self {
        Expr::Node(node)
    }
}

/// An ordered list of children.
///
/// `Display` writes the children separated by single spaces, wrapping nested
/// lists in parentheses. The root returned by [`parse`](crate::parse) holds the
/// top-level lists, so it prints back as the normalised document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExprNode {
    children: Vec<Expr>,
}

impl ExprNode {
    pub fn new(children: Vec<Expr>) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &[Expr] {
        &self.children
    }

    pub fn into_children(self) -> Vec<Expr> {
        self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Expr> {
        self.children.get(index)
    }

    /// The leading token, e.g. `time` for `(time (now 1.0))`.
    pub fn head(&self) -> Option<&str> {
        self.children.first().and_then(Expr::as_leaf)
    }

    /// Child at `index` if it is a nested list.
    pub fn child_node(&self, index: usize) -> Option<&ExprNode> {
        self.children.get(index).and_then(Expr::as_node)
    }

    /// Child at `index` if it is a token.
    pub fn leaf(&self, index: usize) -> Option<&str> {
        self.children.get(index).and_then(Expr::as_leaf)
    }

    /// Nested lists only, in order.
    pub fn nodes(&self) -> impl Iterator<Item = &ExprNode> {
        self.children.iter().filter_map(Expr::as_node)
    }

    /// First nested list whose head is `name`.
    pub fn find(&self, name: &str) -> Option<&ExprNode> {
        self.nodes().find(|node| node.head() == Some(name))
    }

    /// All nested lists whose head is `name`.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ExprNode> + 'a {
        self.nodes().filter(move |node| node.head() == Some(name))
    }

    /// Tokens after the head: `["1.0", "2.0"]` for `(pos 1.0 2.0)`.
    pub fn values(&self) -> Vec<&str> {
        self.children
            .iter()
            .skip(1)
            .filter_map(Expr::as_leaf)
            .collect()
    }

    /// Single value of a named sub-list: `value("now")` on `(time (now 1.0))`
    /// yields `"1.0"`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(|node| node.leaf(1))
    }

    pub(crate) fn push(&mut self, child: Expr) {
        self.children.push(child);
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{child}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(children: Vec<Expr>) -> Expr {
        Expr::Node(ExprNode::new(children))
    }

    fn sample() -> ExprNode {
        // pos 1.0 2.0 (n head) (n torso)
        ExprNode::new(vec![
            "pos".into(),
            "1.0".into(),
            "2.0".into(),
            list(vec!["n".into(), "head".into()]),
            list(vec!["n".into(), "torso".into()]),
        ])
    }

    #[test]
    fn display_wraps_nested_lists() {
        assert_eq!(sample().to_string(), "pos 1.0 2.0 (n head) (n torso)");
        assert_eq!(list(vec!["a".into()]).to_string(), "(a)");
        assert_eq!(ExprNode::default().to_string(), "");
    }

    #[test]
    fn navigation_helpers() {
        let node = sample();
        assert_eq!(node.head(), Some("pos"));
        assert_eq!(node.leaf(1), Some("1.0"));
        assert!(node.leaf(3).is_none());
        assert_eq!(node.child_node(3).unwrap().leaf(1), Some("head"));
        assert!(node.child_node(0).is_none());
        assert_eq!(node.values(), vec!["1.0", "2.0"]);
        assert_eq!(node.value("n"), Some("head"));
        assert_eq!(node.find_all("n").count(), 2);
        assert!(node.find("missing").is_none());
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"["pos","1.0","2.0",["n","head"],["n","torso"]]"#
        );
    }
}
