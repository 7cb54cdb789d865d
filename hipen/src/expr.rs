mod lexer;
mod parser;

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use crate::error::{PetriError, Result};
use crate::net::{PetriNet, DEFAULT_TOKEN};
use crate::state::State;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed form of a functional expression.
///
/// The only non-arithmetic operator is the token-count reference `#(P)` /
/// `#(P, Token)`, which resolves against the state an expression is
/// evaluated with, never against a cached count.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    TokenCount { place: String, token: Option<String> },
    Ceil(Box<Expr>),
    Floor(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn evaluate(&self, state: &State) -> Result<f64> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::TokenCount { place, token } => {
                let counts = state.tokens(place).ok_or_else(|| {
                    PetriError::EvaluationError(format!(
                        "Place '{place}' is not part of the supplied state."
                    ))
                })?;
                let token_id = token.as_deref().unwrap_or(DEFAULT_TOKEN);
                Ok(counts.get(token_id).copied().unwrap_or(0) as f64)
            }
            Expr::Ceil(inner) => Ok(inner.evaluate(state)?.ceil()),
            Expr::Floor(inner) => Ok(inner.evaluate(state)?.floor()),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate(state)?;
                let rhs = rhs.evaluate(state)?;
                Ok(match op {
                    BinOp::Add => lhs + rhs,
                    BinOp::Sub => lhs - rhs,
                    BinOp::Mul => lhs * rhs,
                    BinOp::Div => lhs / rhs,
                })
            }
        }
    }

    /// Every place id the expression references.
    pub fn referenced_component_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        self.collect_references(&mut ids);
        ids
    }

    fn collect_references(&self, into: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::TokenCount { place, .. } => {
                into.insert(place.clone());
            }
            Expr::Ceil(inner) | Expr::Floor(inner) => inner.collect_references(into),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_references(into);
                rhs.collect_references(into);
            }
        }
    }

    /// Rewrite place references through the given mapping; unmapped ids
    /// are left untouched. Token ids are shared vocabulary and stay as
    /// they are.
    pub(crate) fn rename_places(&mut self, rename: &dyn Fn(&str) -> Option<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::TokenCount { place, .. } => {
                if let Some(renamed) = rename(place) {
                    *place = renamed;
                }
            }
            Expr::Ceil(inner) | Expr::Floor(inner) => inner.rename_places(rename),
            Expr::Binary(_, lhs, rhs) => {
                lhs.rename_places(rename);
                rhs.rename_places(rename);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(BinOp::Add | BinOp::Sub, _, _) => 1,
            Expr::Binary(BinOp::Mul | BinOp::Div, _, _) => 2,
            _ => 3,
        }
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => {
                if value.fract() == 0.0 && value.is_finite() {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            Expr::TokenCount { place, token: None } => write!(f, "#({place})"),
            Expr::TokenCount { place, token: Some(token) } => write!(f, "#({place}, {token})"),
            Expr::Ceil(inner) => write!(f, "ceil({inner})"),
            Expr::Floor(inner) => write!(f, "floor({inner})"),
            Expr::Binary(op, lhs, rhs) => {
                let precedence = self.precedence();
                if lhs.precedence() < precedence {
                    write!(f, "({lhs})")?;
                } else {
                    write!(f, "{lhs}")?;
                }
                write!(f, " {op} ")?;
                // subtraction and division do not associate to the right
                let needs_parens = rhs.precedence() < precedence
                    || (rhs.precedence() == precedence
                        && matches!(op, BinOp::Sub | BinOp::Div));
                if needs_parens {
                    write!(f, "({rhs})")
                } else {
                    write!(f, "{rhs}")
                }
            }
        }
    }
}

/// A functional expression parsed against a net.
///
/// Parsing never fails hard: syntax problems and references to components
/// missing from the net are accumulated as messages, and only
/// [`evaluate`](FunctionalExpression::evaluate) turns them into an error.
/// This lets net validation report every problem across a net in one pass
/// before any simulation starts.
#[derive(Clone, Debug)]
pub struct FunctionalExpression {
    source: String,
    ast: Option<Expr>,
    errors: Vec<String>,
    references: BTreeSet<String>,
}

impl FunctionalExpression {
    /// Parse and check every referenced place id against `net`.
    pub fn parse(expression: &str, net: &PetriNet) -> Self {
        let mut parsed = Self::parse_raw(expression);
        if parsed.references.iter().any(|id| net.place(id).is_none()) {
            parsed.errors.push("Not all referenced components exist in the Petri net!".into());
        }
        parsed
    }

    /// Parse without reference checking.
    pub fn parse_raw(expression: &str) -> Self {
        let (tokens, mut errors) = lexer::tokenize(expression);
        let ast = parser::parse(&tokens, &mut errors);
        let references =
            ast.as_ref().map(|ast| ast.referenced_component_ids()).unwrap_or_default();
        FunctionalExpression { source: expression.into(), ast, errors, references }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> Option<&Expr> {
        self.ast.as_ref()
    }

    /// All problems recorded at construction time, syntax and reference
    /// alike, as human-readable messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.ast.is_some()
    }

    pub fn referenced_component_ids(&self) -> &BTreeSet<String> {
        &self.references
    }

    /// Evaluate against a state snapshot.
    ///
    /// Fails if construction recorded any problem (an invalid parse is
    /// never evaluated) or if a referenced place is absent from `state`.
    pub fn evaluate(&self, state: &State) -> Result<f64> {
        match &self.ast {
            Some(ast) if self.errors.is_empty() => ast.evaluate(state),
            _ => {
                let source = &self.source;
                let problems = self.errors.join("; ");
                Err(PetriError::EvaluationError(format!(
                    "there were errors in parsing '{source}', cannot calculate value: {problems}"
                )))
            }
        }
    }
}

/// Rewrite the place references of an expression string through `rename`,
/// returning the regenerated source. Unparsable expressions are returned
/// unchanged so their syntax errors stay visible to validation.
pub(crate) fn rename_references(
    expression: &str,
    rename: &dyn Fn(&str) -> Option<String>,
) -> String {
    let parsed = FunctionalExpression::parse_raw(expression);
    match parsed.ast {
        Some(mut ast) if parsed.errors.is_empty() => {
            ast.rename_places(rename);
            ast.to_string()
        }
        _ => expression.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, PetriNet};
    use crate::state::StateBuilder;

    fn net_with_places(ids: &[&str]) -> PetriNet {
        let mut net = PetriNet::new();
        for id in ids {
            net.add_place(Place::new(*id)).unwrap();
        }
        net
    }

    #[test]
    fn literal_evaluates_for_every_state() {
        let net = net_with_places(&[]);
        let expression = FunctionalExpression::parse("4", &net);
        assert!(expression.is_valid());
        let empty = StateBuilder::new().build();
        let other = StateBuilder::new().count("P0", "Default", 9).build();
        assert_eq!(expression.evaluate(&empty).unwrap(), 4.0);
        assert_eq!(expression.evaluate(&other).unwrap(), 4.0);
    }

    #[test]
    fn token_count_reads_the_supplied_state() {
        let net = net_with_places(&["P0"]);
        let expression = FunctionalExpression::parse("#(P0)", &net);
        let two = StateBuilder::new().count("P0", "Default", 2).build();
        let five = StateBuilder::new().count("P0", "Default", 5).build();
        assert_eq!(expression.evaluate(&two).unwrap(), 2.0);
        assert_eq!(expression.evaluate(&five).unwrap(), 5.0);
    }

    #[test]
    fn token_count_with_explicit_token() {
        let net = net_with_places(&["P0"]);
        let expression = FunctionalExpression::parse("#(P0, Red)", &net);
        let state =
            StateBuilder::new().count("P0", "Red", 3).count("P0", "Default", 7).build();
        assert_eq!(expression.evaluate(&state).unwrap(), 3.0);
    }

    #[test]
    fn missing_place_in_state_is_a_hard_failure() {
        let net = net_with_places(&["P0"]);
        let expression = FunctionalExpression::parse("#(P0)", &net);
        let state = StateBuilder::new().place("P1").build();
        let err = expression.evaluate(&state).unwrap_err();
        assert!(err.to_string().contains("not part of the supplied state"));
    }

    #[test]
    fn referenced_component_ids_collects_places() {
        let net = net_with_places(&["P0", "P1"]);
        let expression = FunctionalExpression::parse("#(P0) + 2 * #(P1, Red)", &net);
        let ids: Vec<&str> =
            expression.referenced_component_ids().iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["P0", "P1"]);
    }

    #[test]
    fn missing_reference_is_recorded_and_blocks_evaluation() {
        let net = net_with_places(&[]);
        let expression = FunctionalExpression::parse("#(P0)", &net);
        assert!(!expression.is_valid());
        assert_eq!(
            expression.errors(),
            ["Not all referenced components exist in the Petri net!"]
        );
        let state = StateBuilder::new().count("P0", "Default", 1).build();
        let err = expression.evaluate(&state).unwrap_err();
        assert!(matches!(err, PetriError::EvaluationError(_)));
    }

    #[test]
    fn syntax_and_reference_problems_accumulate() {
        let net = net_with_places(&[]);
        let expression = FunctionalExpression::parse("#(P0) + $", &net);
        assert!(expression.errors().len() >= 2);
    }

    #[test]
    fn arithmetic_precedence() {
        let net = net_with_places(&[]);
        let state = StateBuilder::new().build();
        assert_eq!(
            FunctionalExpression::parse("2 + 3 * 2", &net).evaluate(&state).unwrap(),
            8.0
        );
        assert_eq!(
            FunctionalExpression::parse("(2 + 3) * 2", &net).evaluate(&state).unwrap(),
            10.0
        );
        assert_eq!(
            FunctionalExpression::parse("7 - 2 - 1", &net).evaluate(&state).unwrap(),
            4.0
        );
    }

    #[test]
    fn ceil_and_floor() {
        let net = net_with_places(&["P0"]);
        let state = StateBuilder::new().count("P0", "Default", 3).build();
        assert_eq!(
            FunctionalExpression::parse("ceil(#(P0) / 2)", &net).evaluate(&state).unwrap(),
            2.0
        );
        assert_eq!(
            FunctionalExpression::parse("floor(#(P0) / 2)", &net).evaluate(&state).unwrap(),
            1.0
        );
    }

    #[test]
    fn rename_references_rewrites_places_only() {
        let renamed = rename_references("#(P0) + #(P1, Red) * 2", &|id| {
            Some(format!("root.{id}"))
        });
        assert_eq!(renamed, "#(root.P0) + #(root.P1, Red) * 2");
    }

    #[test]
    fn rename_references_keeps_unparsable_input() {
        let renamed = rename_references("#(P0", &|_| Some("x".into()));
        assert_eq!(renamed, "#(P0");
    }

    #[test]
    fn rendering_preserves_grouping() {
        let parsed = FunctionalExpression::parse_raw("(1 + 2) * 3 - 4 / (5 - 6)");
        let rendered = parsed.ast().unwrap().to_string();
        assert_eq!(rendered, "(1 + 2) * 3 - 4 / (5 - 6)");
    }
}
