use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::lexer::TokenKind;

/// Non-terminal symbols of the LL(2) grammar. The precedence cascade `P1..P6` with
/// tail productions `NextP0..NextP5` encodes operator precedence directly in the
/// grammar's shape; see `operator_precedence` below for the numeric levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonTerminal {
    StatementList,
    StatementListNext,
    Statement,
    ElseClause,
    ExpressionList,
    ExpressionListNext,
    GroupList,
    GroupListNext,
    Expression,
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
    NextP0,
    NextP1,
    NextP2,
    NextP3,
    NextP4,
    NextP5,
    Value,
}

/// A symbol on either side of a production: a fixed token kind, or a grammar variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Terminal(TokenKind),
    NonTerminal(NonTerminal),
}

impl From<TokenKind> for SymbolKind {
    fn from(kind: TokenKind) -> Self {
        SymbolKind::Terminal(kind)
    }
}

impl From<NonTerminal> for SymbolKind {
    fn from(nt: NonTerminal) -> Self {
        SymbolKind::NonTerminal(nt)
    }
}

/// A single production rule. `body: None` marks an epsilon rule (matches without
/// consuming input).
pub struct GrammarRule {
    pub head: NonTerminal,
    pub body: Option<Vec<SymbolKind>>,
}

impl GrammarRule {
    fn new(head: NonTerminal, body: Vec<SymbolKind>) -> Self {
        Self { head, body: Some(body) }
    }

    fn epsilon(head: NonTerminal) -> Self {
        Self { head, body: None }
    }
}

macro_rules! sym {
    ($e:expr) => {
        SymbolKind::from($e)
    };
}

/// The fixed, right-recursive LL(2) grammar. Rules are tried in declared order by
/// the parser, so ordering here is load-bearing: within one non-terminal, more
/// specific alternatives must precede any epsilon fallback.
pub static GRAMMAR: Lazy<Vec<GrammarRule>> = Lazy::new(|| {
    use NonTerminal::*;
    use TokenKind as T;

    vec![
        // Start. Both non-terminals carry an epsilon fallback so a statement list
        // can end (with or without a trailing ';') and so any non-statement tokens
        // left over after a complete list are silently left unconsumed rather than
        // forcing a hard parse failure — see the FIRST-set-guarded eligibility check
        // in the parser for how the epsilon path is actually reached.
        GrammarRule::new(StatementList, vec![sym!(Statement), sym!(StatementListNext)]),
        GrammarRule::epsilon(StatementList),
        GrammarRule::new(StatementListNext, vec![sym!(T::Semicolon), sym!(StatementList)]),
        GrammarRule::epsilon(StatementListNext),

        // Statements
        GrammarRule::new(Statement, vec![sym!(T::Var), sym!(T::Id), sym!(T::Assign), sym!(Expression)]),
        GrammarRule::new(Statement, vec![sym!(T::Id), sym!(T::Assign), sym!(Expression)]),

        GrammarRule::new(Statement, vec![sym!(T::If), sym!(Expression), sym!(Statement), sym!(ElseClause)]),
        GrammarRule::new(ElseClause, vec![sym!(T::Else), sym!(Statement)]),
        GrammarRule::epsilon(ElseClause),

        GrammarRule::new(Statement, vec![sym!(T::While), sym!(Expression), sym!(Statement)]),
        GrammarRule::new(Statement, vec![sym!(T::Do), sym!(Statement), sym!(T::While), sym!(Expression)]),

        GrammarRule::new(Statement, vec![sym!(T::Id), sym!(T::OpenBrace), sym!(ExpressionList)]),
        GrammarRule::new(ExpressionList, vec![sym!(T::CloseBrace)]),
        GrammarRule::new(ExpressionList, vec![sym!(Expression), sym!(ExpressionListNext)]),
        GrammarRule::new(ExpressionListNext, vec![sym!(T::CloseBrace)]),
        GrammarRule::new(ExpressionListNext, vec![sym!(T::Comma), sym!(Expression), sym!(ExpressionListNext)]),

        GrammarRule::new(Statement, vec![sym!(T::OpenCurly), sym!(GroupList)]),
        GrammarRule::new(GroupList, vec![sym!(Statement), sym!(GroupListNext)]),
        GrammarRule::new(GroupListNext, vec![sym!(T::Semicolon), sym!(T::CloseCurly)]),
        GrammarRule::new(GroupListNext, vec![sym!(T::Semicolon), sym!(GroupList)]),

        GrammarRule::new(Statement, vec![sym!(T::Id), sym!(T::Increment)]),
        GrammarRule::new(Statement, vec![sym!(T::Id), sym!(T::Decrement)]),

        // Expressions: precedence cascade
        GrammarRule::new(Expression, vec![sym!(P1), sym!(NextP0)]),
        GrammarRule::new(P1, vec![sym!(P2), sym!(NextP1)]),
        GrammarRule::new(P2, vec![sym!(P3), sym!(NextP2)]),
        GrammarRule::new(P3, vec![sym!(P4), sym!(NextP3)]),
        GrammarRule::new(P4, vec![sym!(P5), sym!(NextP4)]),
        GrammarRule::new(P5, vec![sym!(P6), sym!(NextP5)]),

        GrammarRule::new(P6, vec![sym!(T::Minus), sym!(Value)]),
        GrammarRule::new(P6, vec![sym!(T::BitNot), sym!(Value)]),
        GrammarRule::new(P6, vec![sym!(T::LogicNot), sym!(Value)]),
        GrammarRule::new(P6, vec![sym!(Value)]),

        // Increment/decrement bind tighter than anything else
        GrammarRule::new(Value, vec![sym!(T::Id), sym!(T::Increment), sym!(NextP5)]),
        GrammarRule::new(Value, vec![sym!(T::Literal), sym!(T::Increment), sym!(NextP5)]),
        GrammarRule::new(Value, vec![sym!(T::OpenBrace), sym!(T::Increment), sym!(Expression), sym!(T::CloseBrace), sym!(NextP5)]),
        GrammarRule::new(Value, vec![sym!(T::Id), sym!(T::Decrement), sym!(NextP5)]),
        GrammarRule::new(Value, vec![sym!(T::Literal), sym!(T::Decrement), sym!(NextP5)]),
        GrammarRule::new(Value, vec![sym!(T::OpenBrace), sym!(T::Decrement), sym!(Expression), sym!(T::CloseBrace), sym!(NextP5)]),

        GrammarRule::new(Value, vec![sym!(T::Id), sym!(NextP5)]),
        GrammarRule::new(Value, vec![sym!(T::Literal), sym!(NextP5)]),
        GrammarRule::new(Value, vec![sym!(T::OpenBrace), sym!(Expression), sym!(T::CloseBrace), sym!(NextP5)]),

        GrammarRule::new(NextP0, vec![sym!(T::GreaterThan), sym!(Expression)]),
        GrammarRule::new(NextP0, vec![sym!(T::GreaterThanEquals), sym!(Expression)]),
        GrammarRule::new(NextP0, vec![sym!(T::LessThan), sym!(Expression)]),
        GrammarRule::new(NextP0, vec![sym!(T::LessThanEquals), sym!(Expression)]),
        GrammarRule::epsilon(NextP0),

        GrammarRule::new(NextP1, vec![sym!(T::Equal), sym!(P1)]),
        GrammarRule::new(NextP1, vec![sym!(T::NotEqual), sym!(P1)]),
        GrammarRule::epsilon(NextP1),

        GrammarRule::new(NextP2, vec![sym!(T::LogicAnd), sym!(P2)]),
        GrammarRule::new(NextP2, vec![sym!(T::LogicOr), sym!(P2)]),
        GrammarRule::new(NextP2, vec![sym!(T::LogicXor), sym!(P2)]),
        GrammarRule::epsilon(NextP2),

        GrammarRule::new(NextP3, vec![sym!(T::BitAnd), sym!(P3)]),
        GrammarRule::new(NextP3, vec![sym!(T::BitOr), sym!(P3)]),
        GrammarRule::new(NextP3, vec![sym!(T::BitNot), sym!(P3)]),
        GrammarRule::epsilon(NextP3),

        GrammarRule::new(NextP4, vec![sym!(T::ShiftLeft), sym!(P4)]),
        GrammarRule::new(NextP4, vec![sym!(T::ShiftRight), sym!(P4)]),
        GrammarRule::epsilon(NextP4),

        GrammarRule::new(NextP5, vec![sym!(T::Plus), sym!(P5)]),
        GrammarRule::new(NextP5, vec![sym!(T::Minus), sym!(P5)]),
        GrammarRule::epsilon(NextP5),
    ]
});

/// Static operator precedence, per §3: higher binds tighter. `None` for tokens that
/// never act as an expression operator. Unary-minus's +1 bump over binary minus is
/// applied per-occurrence by the semantic pass, not baked in here (see `crate::semantic`).
pub fn operator_precedence(kind: TokenKind) -> Option<i32> {
    use TokenKind::*;
    match kind {
        LessThan | LessThanEquals | GreaterThan | GreaterThanEquals => Some(0),
        Equal | NotEqual => Some(1),
        LogicAnd | LogicOr | LogicXor => Some(2),
        BitAnd | BitOr | BitXor => Some(3),
        ShiftLeft | ShiftRight => Some(4),
        Plus | Minus => Some(5),
        BitNot | LogicNot => Some(6),
        Increment | Decrement => Some(7),
        _ => None,
    }
}

const ALL_NONTERMINALS: &[NonTerminal] = {
    use NonTerminal::*;
    &[
        StatementList,
        StatementListNext,
        Statement,
        ElseClause,
        ExpressionList,
        ExpressionListNext,
        GroupList,
        GroupListNext,
        Expression,
        P1,
        P2,
        P3,
        P4,
        P5,
        P6,
        NextP0,
        NextP1,
        NextP2,
        NextP3,
        NextP4,
        NextP5,
        Value,
    ]
};

fn compute_first(
    nt: NonTerminal,
    visiting: &mut HashSet<NonTerminal>,
    memo: &mut HashMap<NonTerminal, HashSet<TokenKind>>,
) -> HashSet<TokenKind> {
    if let Some(cached) = memo.get(&nt) {
        return cached.clone();
    }
    if !visiting.insert(nt) {
        return HashSet::new();
    }
    let mut set = HashSet::new();
    for rule in GRAMMAR.iter().filter(|r| r.head == nt) {
        if let Some(body) = &rule.body {
            match body[0] {
                SymbolKind::Terminal(kind) => {
                    set.insert(kind);
                }
                SymbolKind::NonTerminal(inner) => {
                    set.extend(compute_first(inner, visiting, memo));
                }
            }
        }
    }
    visiting.remove(&nt);
    memo.insert(nt, set.clone());
    set
}

/// FIRST-set per non-terminal: every terminal kind that can be the first token of
/// some derivation of that non-terminal. Used by the parser to decide whether a
/// rule headed by a non-terminal is worth committing to, sharpening the base
/// "some token remains" eligibility check from a blunt presence test into an
/// actual lookahead match.
static FIRST_SETS: Lazy<HashMap<NonTerminal, HashSet<TokenKind>>> = Lazy::new(|| {
    let mut memo = HashMap::new();
    for &nt in ALL_NONTERMINALS {
        let mut visiting = HashSet::new();
        compute_first(nt, &mut visiting, &mut memo);
    }
    memo
});

pub fn first_set(nt: NonTerminal) -> &'static HashSet<TokenKind> {
    FIRST_SETS.get(&nt).expect("FIRST sets are precomputed for every non-terminal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_table_matches_spec_levels() {
        assert_eq!(operator_precedence(TokenKind::LessThan), Some(0));
        assert_eq!(operator_precedence(TokenKind::Equal), Some(1));
        assert_eq!(operator_precedence(TokenKind::LogicAnd), Some(2));
        assert_eq!(operator_precedence(TokenKind::BitAnd), Some(3));
        assert_eq!(operator_precedence(TokenKind::ShiftLeft), Some(4));
        assert_eq!(operator_precedence(TokenKind::Plus), Some(5));
        assert_eq!(operator_precedence(TokenKind::LogicNot), Some(6));
        assert_eq!(operator_precedence(TokenKind::Id), None);
    }

    #[test]
    fn statement_first_set_excludes_closing_punctuation() {
        let set = first_set(NonTerminal::Statement);
        assert!(set.contains(&TokenKind::Var));
        assert!(set.contains(&TokenKind::If));
        assert!(set.contains(&TokenKind::OpenCurly));
        assert!(!set.contains(&TokenKind::CloseBrace));
        assert!(!set.contains(&TokenKind::Semicolon));
    }

    #[test]
    fn grammar_has_exactly_one_epsilon_per_precedence_tail() {
        let tails = [
            NonTerminal::NextP0,
            NonTerminal::NextP1,
            NonTerminal::NextP2,
            NonTerminal::NextP3,
            NonTerminal::NextP4,
            NonTerminal::NextP5,
        ];
        for tail in tails {
            let epsilons = GRAMMAR.iter().filter(|r| r.head == tail && r.body.is_none()).count();
            assert_eq!(epsilons, 1, "{tail:?} should have exactly one epsilon rule");
        }
    }
}
