use itertools::Itertools;

use super::unsupported;
use crate::ir::{CompareOp, Expr, FieldCond, FieldFilter, Func, LogicalOp, PlainPattern, Switch};
use crate::{Error, Result, WithErrorInfo};

pub(super) struct Context<'a> {
    pub collection: Option<&'a str>,
}

impl Context<'_> {
    /// Strips the collection prefix and turns dots into path separators.
    pub fn relative(&self, name: &str) -> String {
        let name = match self.collection {
            Some(collection) => name
                .strip_prefix(collection)
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(name),
            None => name,
        };
        name.replace('.', "/")
    }
}

/// Binding strength, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or,
    And,
    Compare,
    Additive,
    Multiplicative,
    Primary,
}

pub(super) fn translate_expr(expr: &Expr, ctx: &Context) -> Result<String> {
    Ok(translate_operand(expr, ctx)?.0)
}

/// Renders an expression together with how tightly it binds.
fn translate_operand(expr: &Expr, ctx: &Context) -> Result<(String, Precedence)> {
    Ok(match expr {
        Expr::Literal(literal) => (literal.to_string(), Precedence::Primary),
        Expr::Array(_) => return Err(unsupported("array outside of `$in`")),
        Expr::Name(name) => (ctx.relative(name), Precedence::Primary),
        Expr::Compare { op, left, right } => {
            let left = translate_operand(left, ctx)?;
            translate_comparison(left, *op, right, ctx)?
        }
        Expr::Logical { op, args } => translate_logical(*op, args, ctx)?,
        Expr::Not(inner) => {
            let (inner, precedence) = translate_operand(inner, ctx)?;
            let inner = if precedence == Precedence::Primary {
                inner
            } else {
                format!("({inner})")
            };
            (format!("not {inner}"), Precedence::Primary)
        }
        Expr::Function { func, args } => {
            let args: Vec<_> = args
                .iter()
                .map(|a| translate_operand(a, ctx))
                .try_collect()?;
            translate_call(*func, args)?
        }
        Expr::Switch(switch) => (translate_switch(switch, ctx)?, Precedence::Primary),
        Expr::Filter(filter) => translate_filter(filter, ctx)?,
        Expr::Query(_) => return Err(unsupported("sub-select")),
    })
}

fn wrap((text, precedence): (String, Precedence), min: Precedence) -> String {
    if precedence < min {
        format!("({text})")
    } else {
        text
    }
}

fn translate_logical(op: LogicalOp, args: &[Expr], ctx: &Context) -> Result<(String, Precedence)> {
    let (connective, precedence) = match op {
        LogicalOp::And => (" and ", Precedence::And),
        LogicalOp::Or => (" or ", Precedence::Or),
    };
    if args.is_empty() {
        return Err(Error::new_simple(format!(
            "`{op}` requires at least one argument"
        )));
    }
    let args: Vec<_> = args
        .iter()
        .map(|a| Ok(wrap(translate_operand(a, ctx)?, precedence)))
        .collect::<Result<_>>()?;
    Ok((args.join(connective), precedence))
}

fn translate_comparison(
    left: (String, Precedence),
    op: CompareOp,
    right: &Expr,
    ctx: &Context,
) -> Result<(String, Precedence)> {
    let left = wrap(left, Precedence::Additive);

    let operator = match op {
        CompareOp::In | CompareOp::Nin => {
            let Expr::Array(items) = right else {
                return Err(unsupported("`in` with a value other than a list"));
            };
            return translate_membership(&left, op == CompareOp::Nin, items, ctx);
        }
        CompareOp::Eq => "eq",
        CompareOp::Ne => "ne",
        CompareOp::Gt => "gt",
        CompareOp::Gte => "ge",
        CompareOp::Lt => "lt",
        CompareOp::Lte => "le",
    };
    let right = wrap(translate_operand(right, ctx)?, Precedence::Additive);
    Ok((format!("{left} {operator} {right}"), Precedence::Compare))
}

/// `in` becomes a chain of equalities; an empty list matches nothing.
fn translate_membership(
    left: &str,
    negated: bool,
    items: &[Expr],
    ctx: &Context,
) -> Result<(String, Precedence)> {
    if items.is_empty() {
        let constant = if negated { "true" } else { "false" };
        return Ok((constant.to_string(), Precedence::Primary));
    }

    let equalities: Vec<_> = items
        .iter()
        .map(|item| {
            let item = wrap(translate_operand(item, ctx)?, Precedence::Additive);
            Ok(format!("{left} eq {item}"))
        })
        .collect::<Result<_>>()?;

    let (chain, precedence) = if equalities.len() == 1 {
        (equalities.join(""), Precedence::Compare)
    } else {
        (equalities.join(" or "), Precedence::Or)
    };
    Ok(if negated {
        (format!("not ({chain})"), Precedence::Primary)
    } else {
        (chain, precedence)
    })
}

fn translate_switch(switch: &Switch, ctx: &Context) -> Result<String> {
    let mut branches: Vec<String> = switch
        .branches
        .iter()
        .map(|branch| {
            Ok(format!(
                "{}:{}",
                translate_expr(&branch.case, ctx)?,
                translate_expr(&branch.then, ctx)?
            ))
        })
        .collect::<Result<_>>()?;
    if let Some(default) = &switch.default {
        branches.push(format!("true:{}", translate_expr(default, ctx)?));
    }
    Ok(format!("case({})", branches.join(",")))
}

fn translate_filter(filter: &FieldFilter, ctx: &Context) -> Result<(String, Precedence)> {
    let column = (ctx.relative(&filter.field), Precedence::Primary);
    translate_cond(column, &filter.cond, ctx)
}

fn translate_cond(
    column: (String, Precedence),
    cond: &FieldCond,
    ctx: &Context,
) -> Result<(String, Precedence)> {
    match cond {
        FieldCond::Compare { op, value } => translate_comparison(column, *op, value, ctx),
        FieldCond::Regex(pattern) => {
            let Some(plain) = PlainPattern::parse(pattern) else {
                return Err(unsupported("regular expression matching")
                    .push_hint("only plain prefixes, suffixes and infixes can be rendered"));
            };
            let text = crate::ir::Literal::String(plain.text).to_string();
            let column = column.0;
            Ok(match (plain.anchored_start, plain.anchored_end) {
                (true, true) => (format!("{column} eq {text}"), Precedence::Compare),
                (true, false) => (format!("startswith({column},{text})"), Precedence::Primary),
                (false, true) => (format!("endswith({column},{text})"), Precedence::Primary),
                (false, false) => (format!("contains({column},{text})"), Precedence::Primary),
            })
        }
        FieldCond::Text(text) => {
            let text = crate::ir::Literal::String(text.clone()).to_string();
            Ok((format!("contains({},{text})", column.0), Precedence::Primary))
        }
        FieldCond::Apply { func, args, cond } => {
            let mut operands = vec![column];
            for arg in args {
                operands.push(translate_operand(arg, ctx)?);
            }
            let column = translate_call(*func, operands)?;
            translate_cond(column, cond, ctx)
        }
    }
}

fn translate_call(func: Func, args: Vec<(String, Precedence)>) -> Result<(String, Precedence)> {
    let infix = match func {
        Func::Add => Some(("add", Precedence::Additive)),
        Func::Subtract => Some(("sub", Precedence::Additive)),
        Func::Multiply => Some(("mul", Precedence::Multiplicative)),
        Func::Divide => Some(("div", Precedence::Multiplicative)),
        Func::Mod => Some(("mod", Precedence::Multiplicative)),
        Func::Bit => return Err(unsupported("bitwise and")),
        _ => None,
    };

    if let Some((operator, precedence)) = infix {
        let Some((left, right)) = args.into_iter().collect_tuple() else {
            return Err(Error::new_simple(format!("${func} takes two arguments")));
        };
        // left associative: an equally binding right operand needs parentheses
        let left = wrap(left, precedence);
        let right = if right.1 <= precedence {
            format!("({})", right.0)
        } else {
            right.0
        };
        return Ok((format!("{left} {operator} {right}"), precedence));
    }

    let args = args.into_iter().map(|(text, _)| text).collect_vec();
    let text = match func {
        Func::Concat if args.len() > 2 => {
            // nested, since the method takes exactly two arguments
            let mut args = args.into_iter();
            let first = args.next().unwrap_or_default();
            args.fold(first, |acc, arg| format!("concat({acc},{arg})"))
        }
        func => format!("{}({})", method_name(func), args.join(",")),
    };
    Ok((text, Precedence::Primary))
}

fn method_name(func: Func) -> String {
    func.as_ref().to_lowercase()
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;

    use super::*;
    use crate::ir::Partial;

    fn render(expr: &Expr) -> String {
        let ctx = Context {
            collection: Some("Product"),
        };
        translate_expr(expr, &ctx).unwrap()
    }

    #[test]
    fn test_names() {
        let ctx = Context {
            collection: Some("Product"),
        };
        assert_eq!(ctx.relative("Product.name"), "name");
        assert_eq!(ctx.relative("Product.category.name"), "category/name");
        assert_eq!(ctx.relative("ProductBase.name"), "ProductBase/name");
        assert_eq!(ctx.relative("price"), "price");
    }

    #[test]
    fn test_precedence() {
        let expr = Expr::compare(
            CompareOp::Gt,
            Expr::function(
                Func::Multiply,
                vec![
                    Expr::function(Func::Add, vec![Expr::name("price"), 5.into()]),
                    2.into(),
                ],
            ),
            100.into(),
        );
        assert_snapshot!(render(&expr), @"(price add 5) mul 2 gt 100");

        let expr = Expr::function(
            Func::Subtract,
            vec![
                Expr::name("a"),
                Expr::function(Func::Subtract, vec![Expr::name("b"), Expr::name("c")]),
            ],
        );
        assert_snapshot!(render(&expr), @"a sub (b sub c)");

        let expr = Expr::Logical {
            op: LogicalOp::And,
            args: vec![
                Expr::Logical {
                    op: LogicalOp::Or,
                    args: vec![
                        Expr::filter("a", CompareOp::Eq, 1.into()),
                        Expr::filter("b", CompareOp::Eq, 2.into()),
                    ],
                },
                Expr::Not(Box::new(Expr::filter("c", CompareOp::Lte, 3.into()))),
            ],
        };
        assert_snapshot!(render(&expr), @"(a eq 1 or b eq 2) and not (c le 3)");
    }

    #[test]
    fn test_membership() {
        assert_snapshot!(
            render(&Expr::filter("id", CompareOp::In, vec![1, 2].into())),
            @"id eq 1 or id eq 2"
        );
        assert_snapshot!(
            render(&Expr::filter("id", CompareOp::Nin, vec![1].into())),
            @"not (id eq 1)"
        );
        assert_snapshot!(
            render(&Expr::filter("id", CompareOp::In, Vec::<i64>::new().into())),
            @"false"
        );

        let expr = Expr::Logical {
            op: LogicalOp::And,
            args: vec![
                Expr::filter("id", CompareOp::In, vec![1, 2].into()),
                Expr::filter("active", CompareOp::Eq, true.into()),
            ],
        };
        assert_snapshot!(render(&expr), @"(id eq 1 or id eq 2) and active eq true");
    }

    #[test]
    fn test_patterns() {
        let regex = |pattern: &str| {
            Expr::Filter(FieldFilter {
                field: "name".to_string(),
                cond: FieldCond::Regex(pattern.to_string()),
            })
        };
        assert_snapshot!(render(&regex("^A")), @"startswith(name,'A')");
        assert_snapshot!(render(&regex("z$")), @"endswith(name,'z')");
        assert_snapshot!(render(&regex("o'k")), @"contains(name,'o''k')");
        assert_snapshot!(render(&regex(r"^1\.5$")), @"name eq '1.5'");

        let ctx = Context { collection: None };
        let err = translate_expr(&regex("^[0-9]+"), &ctx).unwrap_err();
        assert_snapshot!(err.reason, @"regular expression matching is not supported by odata");
        assert_eq!(err.code, Some("E0005"));
    }

    #[test]
    fn test_methods() {
        let filter = Expr::Filter(
            Partial::new("Product.name")
                .apply(Func::ToLower, vec![])
                .apply(Func::IndexOf, vec!["a".into()])
                .complete(FieldCond::compare(CompareOp::Eq, 0.into())),
        );
        assert_snapshot!(render(&filter), @"indexof(tolower(name),'a') eq 0");

        let concat = Expr::function(
            Func::Concat,
            vec![Expr::name("first"), " ".into(), Expr::name("last")],
        );
        assert_snapshot!(render(&concat), @"concat(concat(first,' '),last)");

        let switch = Expr::Switch(Switch {
            branches: vec![crate::ir::SwitchCase {
                case: Expr::filter("price", CompareOp::Gt, 100.into()),
                then: "high".into(),
            }],
            default: Some(Box::new("low".into())),
        });
        assert_snapshot!(render(&switch), @"case(price gt 100:'high',true:'low')");
    }
}
