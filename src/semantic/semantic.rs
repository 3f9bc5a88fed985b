use std::collections::HashSet;

use crate::error::CompileError;
use crate::grammar::NonTerminal;
use crate::lexer::TokenKind;
use crate::parser::tree::{Child, Node};
use crate::semantic::ast::{assign_precedence, left_rotate, restructure, Expr, Stmt};

/// A checked, operator-rooted program: the flat sequence of top-level statements.
/// The parser's `StatementList`/`StatementListNext` scaffolding doesn't survive
/// into this shape — it only ever existed to thread the grammar's right recursion,
/// and the code generator has no use for it.
#[derive(Debug)]
pub struct Ast {
    pub statements: Vec<Stmt>,
}

/// Runs declaration/use checking and expression restructuring over a parsed
/// `StatementList` tree, producing the checked `Ast` the code generator consumes.
pub fn analyze(tree: Node) -> Result<Ast, CompileError> {
    let mut raw = Vec::new();
    collect_statements(&tree, &mut raw);
    let mut checker = Checker::new();
    let mut statements = Vec::with_capacity(raw.len());
    for stmt in raw {
        statements.push(checker.statement(stmt)?);
    }
    Ok(Ast { statements })
}

struct Checker {
    declared: HashSet<String>,
}

impl Checker {
    fn new() -> Self {
        let mut declared = HashSet::new();
        declared.insert("input".to_string());
        declared.insert("output".to_string());
        Self { declared }
    }

    fn check_declared(&self, name: &str, line: Option<usize>) -> Result<(), CompileError> {
        if self.declared.contains(name) {
            Ok(())
        } else {
            Err(CompileError::semantic(line, format!("use of undeclared variable '{name}'")))
        }
    }

    fn expr(&self, mut e: Expr) -> Result<Expr, CompileError> {
        check_ids(&e, &self.declared)?;
        reject_binary_bitnot(&e)?;
        reject_postfix_incdec(&e)?;
        assign_precedence(&mut e, 0);
        restructure(&mut e);
        left_rotate(&mut e);
        Ok(e)
    }

    fn statement(&mut self, stmt: Node) -> Result<Stmt, CompileError> {
        let line = line_of(&stmt);
        let first = kind_at(&stmt, 0).ok_or_else(|| CompileError::semantic(line, "empty statement"))?;

        match first {
            TokenKind::Var => {
                let name = name_at(&stmt, 1).ok_or_else(|| CompileError::semantic(line, "malformed declaration"))?;
                if !self.declared.insert(name.clone()) {
                    return Err(CompileError::semantic(line, format!("variable '{name}' already declared")));
                }
                let expr = self.expr(child(&stmt, 3)?.clone())?;
                Ok(Stmt::VarDecl { name, expr })
            }
            TokenKind::Id => {
                let name = name_at(&stmt, 0).ok_or_else(|| CompileError::semantic(line, "malformed statement"))?;
                match kind_at(&stmt, 1) {
                    Some(TokenKind::Assign) => {
                        self.check_declared(&name, line)?;
                        let expr = self.expr(child(&stmt, 2)?.clone())?;
                        Ok(Stmt::Assign { name, expr })
                    }
                    Some(TokenKind::Increment) => {
                        self.check_declared(&name, line)?;
                        Ok(Stmt::Increment { name })
                    }
                    Some(TokenKind::Decrement) => {
                        self.check_declared(&name, line)?;
                        Ok(Stmt::Decrement { name })
                    }
                    Some(TokenKind::OpenBrace) => {
                        let list_node = child(&stmt, 2)?;
                        let mut args = Vec::new();
                        collect_expressions(list_node, &mut args);
                        match name.as_str() {
                            "output" => {
                                if args.len() != 1 {
                                    return Err(CompileError::semantic(line, "output takes exactly one argument"));
                                }
                                let expr = self.expr(args.into_iter().next().unwrap())?;
                                Ok(Stmt::Output { expr })
                            }
                            "input" => {
                                if !args.is_empty() {
                                    return Err(CompileError::semantic(line, "input takes no arguments"));
                                }
                                Ok(Stmt::Input)
                            }
                            other => Err(CompileError::semantic(line, format!("'{other}' is not callable"))),
                        }
                    }
                    _ => Err(CompileError::semantic(line, "malformed statement after identifier")),
                }
            }
            TokenKind::If => {
                let cond = self.expr(child(&stmt, 1)?.clone())?;
                let then_branch = Box::new(self.statement(child(&stmt, 2)?.clone())?);
                let else_branch = match stmt.children.get(3).and_then(|c| c.as_node()) {
                    Some(else_clause) => {
                        let inner = child(else_clause, 1)?;
                        Some(Box::new(self.statement(inner.clone())?))
                    }
                    None => None,
                };
                Ok(Stmt::If { cond, then_branch, else_branch })
            }
            TokenKind::While => {
                let cond = self.expr(child(&stmt, 1)?.clone())?;
                let body = Box::new(self.statement(child(&stmt, 2)?.clone())?);
                Ok(Stmt::While { cond, body })
            }
            TokenKind::Do => {
                let body = Box::new(self.statement(child(&stmt, 1)?.clone())?);
                let cond = self.expr(child(&stmt, 3)?.clone())?;
                Ok(Stmt::DoWhile { body, cond })
            }
            TokenKind::OpenCurly => {
                let group_list = child(&stmt, 1)?;
                let mut raw = Vec::new();
                collect_statements(group_list, &mut raw);
                let mut inner = Vec::with_capacity(raw.len());
                for s in raw {
                    inner.push(self.statement(s)?);
                }
                Ok(Stmt::Block(inner))
            }
            other => Err(CompileError::semantic(line, format!("unexpected token {other:?} at statement head"))),
        }
    }
}

fn kind_at(node: &Node, idx: usize) -> Option<TokenKind> {
    node.children.get(idx).and_then(|c| c.as_node()).and_then(|n| n.as_token()).map(|t| t.kind)
}

fn name_at(node: &Node, idx: usize) -> Option<String> {
    node.children.get(idx).and_then(|c| c.as_node()).and_then(|n| n.as_token()).map(|t| t.lexeme.clone())
}

fn child<'a>(node: &'a Node, idx: usize) -> Result<&'a Node, CompileError> {
    node.children
        .get(idx)
        .and_then(|c| c.as_node())
        .ok_or_else(|| CompileError::semantic(line_of(node), "malformed statement node"))
}

fn line_of(node: &Node) -> Option<usize> {
    if let Some(tok) = node.as_token() {
        return Some(tok.line);
    }
    node.present_children().find_map(line_of)
}

fn check_ids(node: &Node, declared: &HashSet<String>) -> Result<(), CompileError> {
    if let Some(tok) = node.as_token() {
        if tok.kind == TokenKind::Id && !declared.contains(&tok.lexeme) {
            return Err(CompileError::semantic(Some(tok.line), format!("use of undeclared variable '{}'", tok.lexeme)));
        }
    }
    for c in node.present_children() {
        check_ids(c, declared)?;
    }
    Ok(())
}

/// `NEXT_P3 -> '~' P3` lets the grammar parse `a ~ b`, but `~` only has a unary
/// reading; a binary-shaped `~` node (two present operands) is rejected here
/// rather than at the grammar level, since the grammar can't see precedence.
fn reject_binary_bitnot(node: &Node) -> Result<(), CompileError> {
    if let Some(tok) = node.as_token() {
        if tok.kind == TokenKind::BitNot
            && node.children.len() == 2
            && matches!(node.children[0], Child::Present(_))
            && matches!(node.children[1], Child::Present(_))
        {
            return Err(CompileError::semantic(Some(tok.line), "'~' is a unary operator and cannot take two operands"));
        }
    }
    for c in node.present_children() {
        reject_binary_bitnot(c)?;
    }
    Ok(())
}

/// The grammar carries a dedicated `VALUE -> ID INCREMENT NEXT_P5` production
/// for a postfix `++`/`--` used inside a larger expression, but nothing past
/// the parser ever rebuilds it into a leaf/unary/binary shape, so it can't
/// reach code generation. Statement-level `x++;` is unaffected — it's handled
/// directly in `statement()` and never routed through here.
fn reject_postfix_incdec(node: &Node) -> Result<(), CompileError> {
    if let Some(tok) = node.as_token() {
        if matches!(tok.kind, TokenKind::Increment | TokenKind::Decrement) {
            return Err(CompileError::semantic(Some(tok.line), "'++'/'--' cannot appear inside an expression"));
        }
    }
    for c in node.present_children() {
        reject_postfix_incdec(c)?;
    }
    Ok(())
}

fn collect_statements(node: &Node, out: &mut Vec<Node>) {
    match node.as_nonterminal() {
        Some(NonTerminal::StatementList)
        | Some(NonTerminal::StatementListNext)
        | Some(NonTerminal::GroupList)
        | Some(NonTerminal::GroupListNext) => {
            for c in node.present_children() {
                collect_statements(c, out);
            }
        }
        Some(NonTerminal::Statement) => out.push(node.clone()),
        _ => {}
    }
}

fn collect_expressions(node: &Node, out: &mut Vec<Node>) {
    match node.as_nonterminal() {
        Some(NonTerminal::ExpressionList) | Some(NonTerminal::ExpressionListNext) => {
            for c in node.present_children() {
                collect_expressions(c, out);
            }
        }
        _ => {
            let is_separator = matches!(node.as_token().map(|t| t.kind), Some(TokenKind::CloseBrace) | Some(TokenKind::Comma));
            if !is_separator {
                out.push(node.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn analyze_src(src: &str) -> Result<Ast, CompileError> {
        let tokens = Lexer::new(src).scan_tokens().unwrap();
        let tree = Parser::new(tokens).parse().unwrap();
        analyze(tree)
    }

    #[test]
    fn declares_then_uses_variable() {
        let ast = analyze_src("var x = 5; x = x + 1;").unwrap();
        assert_eq!(ast.statements.len(), 2);
        assert!(matches!(ast.statements[0], Stmt::VarDecl { .. }));
        assert!(matches!(ast.statements[1], Stmt::Assign { .. }));
    }

    #[test]
    fn use_before_declaration_is_semantic_error() {
        let err = analyze_src("x = 1;").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn self_referential_declaration_is_legal() {
        // The declared name enters the symbol set before its own initializer is
        // checked, per the pre-order "declare, then descend" rule.
        let ast = analyze_src("var x = x;").unwrap();
        assert!(matches!(ast.statements[0], Stmt::VarDecl { .. }));
    }

    #[test]
    fn redeclaration_is_semantic_error() {
        let err = analyze_src("var x = 1; var x = 2;").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn output_call_is_recognized() {
        let ast = analyze_src("var x = 1; output(x);").unwrap();
        assert!(matches!(ast.statements[1], Stmt::Output { .. }));
    }

    #[test]
    fn input_call_takes_no_arguments() {
        let err = analyze_src("input(1);").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn calling_an_undeclared_name_is_rejected() {
        let err = analyze_src("foo(1);").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn nested_block_and_control_flow() {
        let ast = analyze_src("var x = 0; while (x) { x = x - 1; };").unwrap();
        assert_eq!(ast.statements.len(), 2);
        assert!(matches!(ast.statements[1], Stmt::While { .. }));
    }

    #[test]
    fn postfix_incdec_inside_expression_is_rejected() {
        let err = analyze_src("var x = 1; var y = x++ + 1;").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn if_else_both_branches_checked() {
        let ast = analyze_src("var x = 1; if (x) x = 2; else x = 3;").unwrap();
        assert!(matches!(ast.statements[1], Stmt::If { else_branch: Some(_), .. }));
    }
}
