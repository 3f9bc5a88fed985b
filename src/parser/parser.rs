use crate::error::CompileError;
use crate::grammar::{first_set, NonTerminal, SymbolKind, GRAMMAR};
use crate::lexer::{Token, TokenKind};
use crate::parser::tree::{Child, Node};

/// Recursive-descent LL(2) constructor: at each non-terminal it walks the grammar's
/// rule list in declared order and commits to the first rule whose first one or two
/// symbols match the upcoming tokens. There is no backtracking once a rule commits.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Node, CompileError> {
        let tree = self.parse_nonterminal(NonTerminal::StatementList)?;
        log::info!("parser consumed {}/{} tokens", self.pos, self.tokens.len());
        Ok(tree)
    }

    fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn current_line(&self) -> Option<usize> {
        self.tokens.get(self.pos).map(|t| t.line).or_else(|| self.tokens.last().map(|t| t.line))
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    /// A rule is eligible when its first symbol matches the upcoming token (terminal:
    /// exact kind match; non-terminal: the token falls in that non-terminal's FIRST
    /// set — this is what lets a statement list's continuation gracefully bottom out
    /// in its epsilon alternative instead of committing to a child parse doomed to
    /// fail) AND, whenever the rule's second symbol is itself a terminal, the token
    /// after next matches it too. That second check applies regardless of whether
    /// the first symbol was terminal or non-terminal — a terminal-led rule commits
    /// on its leading token alone otherwise, which is wrong whenever two terminal-led
    /// rules share that leading token (e.g. `Value -> Id Increment NextP5` vs.
    /// `Value -> Id NextP5`).
    fn eligible(&self, body: &[SymbolKind]) -> bool {
        let first_ok = match body.first() {
            Some(SymbolKind::Terminal(kind)) => self.peek_kind(0) == Some(*kind),
            Some(SymbolKind::NonTerminal(nt)) => {
                let Some(next) = self.peek_kind(0) else {
                    return false;
                };
                first_set(*nt).contains(&next)
            }
            None => return false,
        };
        if !first_ok {
            return false;
        }
        match body.get(1) {
            Some(SymbolKind::Terminal(kind)) => self.peek_kind(1) == Some(*kind),
            _ => true,
        }
    }

    fn parse_nonterminal(&mut self, nt: NonTerminal) -> Result<Node, CompileError> {
        let rules: Vec<&'static [SymbolKind]> = GRAMMAR
            .iter()
            .filter(|r| r.head == nt)
            .filter_map(|r| r.body.as_deref())
            .collect();
        let has_epsilon = GRAMMAR.iter().any(|r| r.head == nt && r.body.is_none());

        for body in &rules {
            if self.eligible(body) {
                let children = self.parse_body(body)?;
                return Ok(Node::nonterminal(nt, children));
            }
        }

        if has_epsilon {
            return Ok(Node::nonterminal(nt, Vec::new()));
        }

        Err(CompileError::syntax(
            self.current_line(),
            format!("no grammar rule eligible for {nt:?} at token {:?}", self.peek_kind(0)),
        ))
    }

    fn parse_body(&mut self, body: &[SymbolKind]) -> Result<Vec<Child>, CompileError> {
        let mut children = Vec::with_capacity(body.len());
        for symbol in body {
            match symbol {
                SymbolKind::Terminal(kind) => {
                    if self.peek_kind(0) != Some(*kind) {
                        return Err(CompileError::syntax(
                            self.current_line(),
                            format!("expected {kind:?}, found {:?}", self.peek_kind(0)),
                        ));
                    }
                    let token = self.advance();
                    children.push(Child::present(Node::terminal(token)));
                }
                SymbolKind::NonTerminal(nt) => {
                    let node = self.parse_nonterminal(*nt)?;
                    if let Some(compacted) = compact(node) {
                        children.push(Child::present(compacted));
                    }
                }
            }
        }
        Ok(children)
    }
}

/// Post-recursion tree compaction: an epsilon match (zero children) vanishes
/// entirely; a single non-terminal child is adopted in place of its now-redundant
/// parent "chain" node. Everything else is kept as-is.
fn compact(mut node: Node) -> Option<Node> {
    if node.children.is_empty() {
        if let crate::parser::tree::NodeKind::NonTerminal(_) = node.kind {
            return None;
        }
        return Some(node);
    }
    if node.children.len() == 1 {
        let is_nonterminal_chain = matches!(
            &node.children[0],
            Child::Present(only) if only.as_nonterminal().is_some()
        );
        if is_nonterminal_chain {
            let mut children = std::mem::take(&mut node.children);
            if let Child::Present(only) = children.pop().unwrap() {
                return Some(*only);
            }
        }
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Node {
        let tokens = Lexer::new(src).scan_tokens().unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    #[test]
    fn parses_simple_declaration() {
        let tree = parse("var x = 5;");
        assert!(tree.is_nonterminal(NonTerminal::StatementList));
        assert!(!tree.children.is_empty());
    }

    #[test]
    fn parses_if_else() {
        let tree = parse("if (x) y = 1; else y = 2;");
        assert!(tree.is_nonterminal(NonTerminal::StatementList));
    }

    #[test]
    fn parses_nested_braced_group() {
        let tree = parse("while (x) { x++; };");
        assert!(tree.is_nonterminal(NonTerminal::StatementList));
    }

    #[test]
    fn trailing_tokens_after_statement_list_are_not_rejected() {
        let tokens = Lexer::new("x = 1; ) ) )").scan_tokens().unwrap();
        let result = Parser::new(tokens).parse();
        assert!(result.is_ok());
    }

    #[test]
    fn unmatched_closing_paren_is_syntax_error() {
        let tokens = Lexer::new("x = (1;").scan_tokens().unwrap();
        let err = Parser::new(tokens).parse().unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }
}
