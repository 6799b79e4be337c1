//! Relation text to [`Expr`].
//!
//! `evalexpr` tokenizes the text and builds the operator tree; this module
//! walks that tree and resolves names against the model.
//!
//! ```text
//! name            scalar unknown or parameter
//! S.F             total flow of stream S
//! S.f[c]          component flow of c in S
//! S.x[c], S.z[c]  mole fraction of c in S
//! ln(e), exp(e), sqrt(e)
//! ```
//!
//! Exponents must fold to a numeric constant.

use evalexpr::{Node, Operator, Value};

use crate::entity::EntityKind;
use crate::error::{ModelError, ModelResult};
use crate::expr::Expr;
use crate::model::EntityModel;

struct Converter<'a> {
    text: &'a str,
    model: &'a EntityModel,
}

impl<'a> Converter<'a> {
    fn new(text: &'a str, model: &'a EntityModel) -> Self {
        Self { text, model }
    }

    fn error(&self, message: impl Into<String>) -> ModelError {
        ModelError::Parse {
            text: self.text.to_string(),
            message: message.into(),
        }
    }

    fn tree(&self) -> ModelResult<Node> {
        evalexpr::build_operator_tree(self.text).map_err(|e| self.error(e.to_string()))
    }

    fn only_child<'n>(&self, node: &'n Node) -> ModelResult<&'n Node> {
        match node.children() {
            [child] => Ok(child),
            [] => Err(self.error("empty expression")),
            _ => Err(self.error("expected a single expression")),
        }
    }

    fn operands<'n>(&self, node: &'n Node) -> ModelResult<(&'n Node, &'n Node)> {
        match node.children() {
            [a, b] => Ok((a, b)),
            _ => Err(self.error("operator is missing an operand")),
        }
    }

    fn expr(&self, node: &Node) -> ModelResult<Expr> {
        match node.operator() {
            Operator::RootNode => self.expr(self.only_child(node)?),
            Operator::Add | Operator::Sub => {
                let mut terms = Vec::new();
                self.collect_terms(node, false, &mut terms)?;
                Ok(Expr::sum(terms))
            }
            Operator::Mul => {
                let (a, b) = self.operands(node)?;
                Ok(self.expr(a)? * self.expr(b)?)
            }
            Operator::Div => {
                let (a, b) = self.operands(node)?;
                Ok(self.expr(a)? / self.expr(b)?)
            }
            Operator::Neg => Ok(-self.expr(self.only_child(node)?)?),
            Operator::Exp => {
                let (base, exponent) = self.operands(node)?;
                match self.expr(exponent)?.const_value() {
                    Some(p) if p.is_finite() => Ok(self.expr(base)?.powf(p)),
                    _ => Err(self.error("exponent must be a numeric constant")),
                }
            }
            Operator::Const { value } => match value {
                Value::Float(v) => Ok(Expr::constant(*v)),
                Value::Int(v) => Ok(Expr::constant(*v as f64)),
                other => Err(self.error(format!("{other:?} is not a number"))),
            },
            Operator::VariableIdentifierRead { identifier } => self.reference(identifier),
            Operator::FunctionIdentifier { identifier } => {
                let apply: fn(Expr) -> Expr = match identifier.as_str() {
                    "ln" => Expr::ln,
                    "exp" => Expr::exp,
                    "sqrt" => |e| e.powf(0.5),
                    other => return Err(self.error(format!("unknown function '{other}'"))),
                };
                Ok(apply(self.expr(self.only_child(node)?)?))
            }
            Operator::Eq => Err(self.error("unexpected '=='")),
            other => Err(self.error(format!("unsupported operator {other:?}"))),
        }
    }

    /// Flatten a chain of `+` and `-` into signed terms.
    fn collect_terms(&self, node: &Node, negate: bool, out: &mut Vec<Expr>) -> ModelResult<()> {
        match node.operator() {
            Operator::Add => {
                let (a, b) = self.operands(node)?;
                self.collect_terms(a, negate, out)?;
                self.collect_terms(b, negate, out)
            }
            Operator::Sub => {
                let (a, b) = self.operands(node)?;
                self.collect_terms(a, negate, out)?;
                self.collect_terms(b, !negate, out)
            }
            _ => {
                let term = self.expr(node)?;
                out.push(if negate { -term } else { term });
                Ok(())
            }
        }
    }

    fn reference(&self, name: &str) -> ModelResult<Expr> {
        match name.split_once('.') {
            Some((stream, attr)) => self.stream_reference(stream, attr),
            None => self.scalar_reference(name),
        }
    }

    fn stream_reference(&self, stream_name: &str, attr: &str) -> ModelResult<Expr> {
        let stream = self.model.stream(stream_name)?;
        if attr == "F" {
            return self.model.total_flow(stream);
        }
        match attr.strip_suffix(']').and_then(|a| a.split_once('[')) {
            Some((kind @ ("f" | "x" | "z"), component_name)) => {
                let component = self.model.component(component_name)?;
                if kind == "f" {
                    self.model.component_flow(stream, component)
                } else {
                    self.model.mole_fraction(stream, component)
                }
            }
            _ => Err(self.error(format!("unknown stream attribute '{attr}'"))),
        }
    }

    fn scalar_reference(&self, name: &str) -> ModelResult<Expr> {
        if let Ok(var) = self.model.variable(name) {
            return Ok(Expr::var(var));
        }
        if let Ok(param) = self.model.parameter(name) {
            return Ok(Expr::param(param));
        }
        Err(ModelError::UnknownEntity {
            kind: EntityKind::Variable,
            name: name.to_string(),
        })
    }
}

/// Parse a single expression.
pub fn parse_expr(text: &str, model: &EntityModel) -> ModelResult<Expr> {
    let converter = Converter::new(text, model);
    let tree = converter.tree()?;
    converter.expr(&tree)
}

/// Parse `lhs == rhs` into its two sides.
pub fn parse_relation(text: &str, model: &EntityModel) -> ModelResult<(Expr, Expr)> {
    let converter = Converter::new(text, model);
    let tree = converter.tree()?;
    let top = converter.only_child(&tree)?;
    if !matches!(top.operator(), Operator::Eq) {
        return Err(converter.error("expected 'lhs == rhs'"));
    }
    let (lhs, rhs) = converter.operands(top)?;
    Ok((converter.expr(lhs)?, converter.expr(rhs)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Bounds, CompositionBasis, StreamInit, StreamSpec};
    use crate::expr::SliceEnv;

    fn model() -> EntityModel {
        let mut m = EntityModel::new();
        m.declare_component("A").unwrap();
        m.declare_component("B").unwrap();
        m.declare_unknown("S", Bounds::FREE, 2.0).unwrap();
        m.declare_unknown("X", Bounds::FRACTION, 0.5).unwrap();
        m.declare_parameter("k", 3.0).unwrap();
        m.declare_stream(StreamSpec::free(
            "m",
            CompositionBasis::Flows,
            StreamInit::uniform(10.0, 5.0),
        ))
        .unwrap();
        m.declare_stream(StreamSpec::fixed("feed", 4.0, &[("A", 0.25), ("B", 0.75)]))
            .unwrap();
        m
    }

    fn eval(expr: &Expr, m: &EntityModel) -> f64 {
        let vars = m.initial_assignment();
        let params = m.param_values();
        expr.eval(&SliceEnv {
            vars: vars.as_slice(),
            params: &params,
        })
    }

    #[test]
    fn parses_selectivity_relation() {
        let m = model();
        let (lhs, rhs) = parse_relation("S*(1-X)^1.544 == (1-X)^1.544 - 0.0036", &m).unwrap();
        let base = 0.5_f64.powf(1.544);
        assert!((eval(&lhs, &m) - 2.0 * base).abs() < 1e-12);
        assert!((eval(&rhs, &m) - (base - 0.0036)).abs() < 1e-12);
    }

    #[test]
    fn parses_stream_references() {
        let m = model();
        let e = parse_expr("m.f[A] + feed.f[B] - m.F / k", &m).unwrap();
        assert!((eval(&e, &m) - (5.0 + 3.0 - 10.0 / 3.0)).abs() < 1e-12);
        let z = parse_expr("feed.z[A] * ln(exp(2))", &m).unwrap();
        assert!((eval(&z, &m) - 0.5).abs() < 1e-12);
        let x = parse_expr("m.x[B]", &m).unwrap();
        assert!((eval(&x, &m) - 0.5).abs() < 1e-12);
        let root = parse_expr("sqrt(m.F * 10)", &m).unwrap();
        assert!((eval(&root, &m) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn subtraction_chains_stay_left_associative() {
        let m = model();
        assert_eq!(parse_expr("10 - 3 - 2", &m).unwrap().const_value(), Some(5.0));
        assert_eq!(parse_expr("10 - (3 - 2)", &m).unwrap().const_value(), Some(9.0));
        let e = parse_expr("m.F - S + k", &m).unwrap();
        assert!((eval(&e, &m) - (10.0 - 2.0 + 3.0)).abs() < 1e-12);
    }

    #[test]
    fn precedence_and_unary_minus() {
        let m = model();
        assert_eq!(parse_expr("2 + 3 * 4", &m).unwrap().const_value(), Some(14.0));
        assert_eq!(parse_expr("-2^2", &m).unwrap().const_value(), Some(-4.0));
        assert_eq!(parse_expr("2^-1", &m).unwrap().const_value(), Some(0.5));
        assert_eq!(parse_expr("8 / 2 / 2", &m).unwrap().const_value(), Some(2.0));
        assert_eq!(parse_expr("1.5e2 - 50", &m).unwrap().const_value(), Some(100.0));
    }

    #[test]
    fn display_round_trips() {
        let m = model();
        for text in [
            "S * (1 - X)^1.544",
            "m.f[A] - 0.5 * m.F",
            "ln(m.F) / (k + S)",
            "-(S + X)",
            "feed.F * feed.z[B]",
        ] {
            let parsed = parse_expr(text, &m).unwrap();
            let shown = parsed.display(&m).to_string();
            let reparsed = parse_expr(&shown, &m).unwrap();
            assert_eq!(parsed, reparsed, "{text} -> {shown}");
        }
    }

    #[test]
    fn syntax_errors_name_the_text() {
        let m = model();
        match parse_relation("S + == 1", &m) {
            Err(ModelError::Parse { text, .. }) => assert_eq!(text, "S + == 1"),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(matches!(parse_relation("S + 1", &m), Err(ModelError::Parse { .. })));
        assert!(matches!(parse_relation("S == X == 1", &m), Err(ModelError::Parse { .. })));
        assert!(matches!(parse_expr("S == 1", &m), Err(ModelError::Parse { .. })));
        assert!(matches!(parse_expr("cosh(S)", &m), Err(ModelError::Parse { .. })));
        assert!(matches!(parse_expr("S ^ X", &m), Err(ModelError::Parse { .. })));
        assert!(matches!(parse_expr("m.q[A]", &m), Err(ModelError::Parse { .. })));
        assert!(matches!(parse_expr("(S", &m), Err(ModelError::Parse { .. })));
        assert!(matches!(parse_expr("S $ 2", &m), Err(ModelError::Parse { .. })));
    }

    #[test]
    fn unresolved_names_are_unknown_entities() {
        let m = model();
        assert!(matches!(
            parse_expr("missing + 1", &m),
            Err(ModelError::UnknownEntity { .. })
        ));
        assert!(matches!(
            parse_expr("nowhere.F", &m),
            Err(ModelError::UnknownEntity { kind: EntityKind::Stream, .. })
        ));
        assert!(matches!(
            parse_expr("m.f[C]", &m),
            Err(ModelError::UnknownEntity { kind: EntityKind::Component, .. })
        ));
    }
}
