use crate::grammar::{operator_precedence, NonTerminal};
use crate::lexer::TokenKind;
use crate::parser::tree::{Child, Node, NodeKind};

/// An expression is just the same uniform tree the parser produces, restructured
/// in place into an operator-rooted form by the three passes below.
pub type Expr = Node;

/// A fully checked, operator-rooted statement. Distinct from the raw parse tree's
/// `Statement` non-terminal: by this point declaration/use checks have passed and
/// every nested expression has been rebuilt into its final AST shape, so codegen
/// can match on these variants directly instead of re-deriving statement shape
/// from token children.
#[derive(Debug, Clone)]
pub enum Stmt {
    VarDecl { name: String, expr: Expr },
    Assign { name: String, expr: Expr },
    Increment { name: String },
    Decrement { name: String },
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, cond: Expr },
    Output { expr: Expr },
    Input,
    Block(Vec<Stmt>),
}

/// Top-down pass 1: threads the parenthesis offset through each node's own child
/// list (left to right) and stamps every operator-terminal leaf it finds with an
/// adjusted precedence (static level + current offset), without ever mutating the
/// static table itself. At the lone `P6 -> '-' VALUE` production site the leading
/// `-` is additionally bumped by one, resolving unary/binary ambiguity in favor of
/// the tighter-binding unary reading.
pub fn assign_precedence(node: &mut Node, offset: i32) {
    let unary_minus_site = matches!(node.kind, NodeKind::NonTerminal(NonTerminal::P6))
        && matches!(
            node.children.first(),
            Some(Child::Present(child)) if matches!(&child.kind, NodeKind::Terminal(t) if t.kind == TokenKind::Minus)
        );

    let mut current_offset = offset;
    for (idx, child) in node.children.iter_mut().enumerate() {
        let Child::Present(child_node) = child else { continue };
        match &child_node.kind {
            NodeKind::Terminal(tok) if tok.kind == TokenKind::OpenBrace => {
                current_offset += 10;
            }
            NodeKind::Terminal(tok) if tok.kind == TokenKind::CloseBrace => {
                current_offset -= 10;
            }
            NodeKind::Terminal(tok) => {
                if let Some(base) = operator_precedence(tok.kind) {
                    let mut adjusted = base + current_offset;
                    if unary_minus_site && idx == 0 {
                        adjusted += 1;
                    }
                    child_node.adjusted_precedence = Some(adjusted);
                }
            }
            NodeKind::NonTerminal(_) => {
                assign_precedence(child_node, current_offset);
            }
        }
    }
}

fn lowest_precedence_index(node: &Node) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (idx, c) in node.children.iter().enumerate() {
        if let Child::Present(gc) = c {
            if let Some(p) = gc.adjusted_precedence {
                let replace = match best {
                    None => true,
                    Some((_, best_p)) => p < best_p,
                };
                if replace {
                    best = Some((idx, p));
                }
            }
        }
    }
    best.map(|(idx, _)| idx)
}

/// Bottom-up pass 2: at each node, post-order, lift the lowest-adjusted-precedence
/// operator found among a child's own children up into that child's slot. An
/// operator may need to bubble up through several wrapper levels (the grammar's
/// `P1..P6`/`NEXT_Px` cascade) before both of its operands are in place — each
/// visit merges newly-arrived operands into any the lifted node already holds
/// from an earlier bubble-up, favoring whichever side is already concrete.
pub fn restructure(node: &mut Node) {
    for child in node.children.iter_mut() {
        if let Child::Present(c) = child {
            restructure(c);
        }
    }
    for i in 0..node.children.len() {
        reparent_one(node, i);
    }
}

fn reparent_one(node: &mut Node, i: usize) {
    let (slot_count, lowest_idx) = match &node.children[i] {
        Child::Present(child) => match lowest_precedence_index(child) {
            Some(j) => (child.children.len(), j),
            None => return,
        },
        Child::Absent => return,
    };

    let mut child = match std::mem::replace(&mut node.children[i], Child::Absent) {
        Child::Present(c) => c,
        Child::Absent => unreachable!("checked above"),
    };

    let mut lifted = match std::mem::replace(&mut child.children[lowest_idx], Child::Absent) {
        Child::Present(n) => n,
        Child::Absent => unreachable!("lowest_precedence_index only returns Present slots"),
    };

    let mut new_children: Vec<Child> = Vec::with_capacity(slot_count);
    for k in 0..slot_count {
        if k == lowest_idx {
            new_children.push(Child::Absent);
        } else {
            new_children.push(std::mem::replace(&mut child.children[k], Child::Absent));
        }
    }

    let target_len = new_children.len().max(lifted.children.len());
    while lifted.children.len() < target_len {
        lifted.children.push(Child::Absent);
    }
    for (k, candidate) in new_children.into_iter().enumerate() {
        let existing_present = matches!(lifted.children[k], Child::Present(_));
        if !existing_present {
            lifted.children[k] = candidate;
        }
    }

    node.children[i] = Child::Present(lifted);
}

fn is_binary_operator(n: &Node) -> bool {
    n.adjusted_precedence.is_some()
        && n.children.len() == 2
        && matches!(n.children[0], Child::Present(_))
        && matches!(n.children[1], Child::Present(_))
}

/// Top-down pass 3: restores left associativity. The grammar's right recursion
/// leaves same-precedence operator chains right-skewed (`a + (b + c)`); this walk
/// rotates each such chain left (`(a + b) + c`) without disturbing nesting between
/// different precedence levels.
pub fn left_rotate(node: &mut Node) {
    for i in 0..node.children.len() {
        loop {
            let should_rotate = match &node.children[i] {
                Child::Present(op1) if is_binary_operator(op1) => match &op1.children[1] {
                    Child::Present(op2) => is_binary_operator(op2) && op2.adjusted_precedence == op1.adjusted_precedence,
                    Child::Absent => false,
                },
                _ => false,
            };
            if !should_rotate {
                break;
            }
            rotate_left_at(node, i);
        }
        if let Child::Present(child) = &mut node.children[i] {
            left_rotate(child);
        }
    }
}

fn rotate_left_at(node: &mut Node, i: usize) {
    let mut op1 = match std::mem::replace(&mut node.children[i], Child::Absent) {
        Child::Present(n) => n,
        Child::Absent => unreachable!("checked by caller"),
    };
    let mut op2 = match std::mem::replace(&mut op1.children[1], Child::Absent) {
        Child::Present(n) => n,
        Child::Absent => unreachable!("checked by caller"),
    };
    let op2_left = std::mem::replace(&mut op2.children[0], Child::Absent);
    op1.children[1] = op2_left;
    op2.children[0] = Child::Present(op1);
    node.children[i] = Child::Present(op2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{Lexer, Token, TokenKind as TK};
    use crate::parser::Parser;

    fn build_expr(src: &str) -> Expr {
        // Parse `x = <src>;` and pull out the assignment's expression child.
        let tokens = Lexer::new(&format!("x = {src};")).scan_tokens().unwrap();
        let tree = Parser::new(tokens).parse().unwrap();
        let stmt = tree.present_children().next().unwrap().clone();
        let expr_child = stmt.children.last().unwrap();
        let mut expr = expr_child.as_node().unwrap().clone();
        assign_precedence(&mut expr, 0);
        restructure(&mut expr);
        left_rotate(&mut expr);
        expr
    }

    fn op_kind(n: &Expr) -> Option<TokenKind> {
        n.as_token().map(|t: &Token| t.kind)
    }

    #[test]
    fn binary_plus_gets_two_present_children() {
        let expr = build_expr("1 + 2");
        assert_eq!(op_kind(&expr), Some(TK::Plus));
        assert!(matches!(expr.children[0], Child::Present(_)));
        assert!(matches!(expr.children[1], Child::Present(_)));
    }

    #[test]
    fn left_associative_subtraction_chain() {
        // a - b - c should become (a - b) - c: outer op's left child is itself a Minus.
        let expr = build_expr("a - b - c");
        assert_eq!(op_kind(&expr), Some(TK::Minus));
        let left = expr.children[0].as_node().unwrap();
        assert_eq!(op_kind(left), Some(TK::Minus));
    }

    #[test]
    fn shift_binds_looser_than_plus() {
        // 1 + 2 << 1 should parse as (1 + 2) << 1: root is ShiftLeft.
        let expr = build_expr("1 + 2 << 1");
        assert_eq!(op_kind(&expr), Some(TK::ShiftLeft));
        let left = expr.children[0].as_node().unwrap();
        assert_eq!(op_kind(left), Some(TK::Plus));
    }

    #[test]
    fn unary_minus_has_absent_left_child() {
        let expr = build_expr("-a");
        assert_eq!(op_kind(&expr), Some(TK::Minus));
        assert!(matches!(expr.children[0], Child::Absent));
        assert!(matches!(expr.children[1], Child::Present(_)));
    }

    #[test]
    fn parens_override_precedence() {
        // (1 + 2) * style grouping isn't available (no '*'), but <<'s looser
        // binding should be reversed by explicit parens around the '+'.
        let expr = build_expr("1 << (2 + 1)");
        assert_eq!(op_kind(&expr), Some(TK::ShiftLeft));
        let right = expr.children[1].as_node().unwrap();
        assert_eq!(op_kind(right), Some(TK::Plus));
    }
}
