//! Translation of IR expressions into SQL text.

use std::ops::RangeInclusive;

use itertools::Itertools;

use super::gen_query::translate_query;
use super::Context;
use crate::ir::{CompareOp, Expr, FieldCond, FieldFilter, Func, Literal, LogicalOp, PlainPattern, Switch};
use crate::{Error, Reason, Result};

pub(super) fn translate_expr(expr: &Expr, ctx: &Context) -> Result<String> {
    Ok(match expr {
        Expr::Literal(literal) => translate_literal(literal, ctx)?,
        Expr::Array(items) => translate_list(items, ctx)?,
        Expr::Name(name) => translate_ident(name, ctx)?,
        Expr::Compare { op, left, right } => {
            let left = translate_expr(left, ctx)?;
            translate_comparison(&left, *op, right, ctx)?
        }
        Expr::Logical { op, args } => translate_logical(*op, args, ctx)?,
        Expr::Not(inner) => format!("NOT {}", translate_expr(inner, ctx)?),
        Expr::Function { func, args } => translate_function(*func, args, ctx)?,
        Expr::Switch(switch) => translate_switch(switch, ctx)?,
        Expr::Filter(filter) => translate_filter(filter, ctx)?,
        Expr::Query(query) => format!("({})", translate_query(query, ctx)?),
    })
}

pub(super) fn translate_ident(name: &str, ctx: &Context) -> Result<String> {
    if !ctx.validator.test(name) {
        return Err(Error::new(Reason::Expected {
            who: None,
            expected: "a valid identifier".to_string(),
            found: format!("`{name}`"),
        }));
    }
    Ok(ctx
        .validator
        .escape(name, ctx.dialect_handler.ident_format()))
}

pub(super) fn translate_literal(literal: &Literal, ctx: &Context) -> Result<String> {
    let handler = &ctx.dialect_handler;
    Ok(match literal {
        Literal::Null => "NULL".to_string(),
        Literal::Boolean(b) => handler.translate_boolean(*b).to_string(),
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) => {
            if !f.is_finite() {
                return Err(Error::new_simple(format!(
                    "{literal} has no SQL representation"
                )));
            }
            format!("{f:?}")
        }
        Literal::String(s) | Literal::Guid(s) | Literal::Duration(s) => handler.translate_string(s),
        Literal::DateTime(dt) => handler.translate_datetime(dt),
        Literal::Binary(hex) => handler.translate_binary(hex),
    })
}

fn translate_list(items: &[Expr], ctx: &Context) -> Result<String> {
    if items.is_empty() {
        return Ok("(NULL)".to_string());
    }
    let items: Vec<_> = items
        .iter()
        .map(|i| translate_expr(i, ctx))
        .try_collect()?;
    Ok(format!("({})", items.join(", ")))
}

fn translate_logical(op: LogicalOp, args: &[Expr], ctx: &Context) -> Result<String> {
    let connective = match op {
        LogicalOp::And => " AND ",
        LogicalOp::Or => " OR ",
    };
    match args {
        [] => Err(Error::new_simple(format!(
            "`{op}` requires at least one argument"
        ))),
        [only] => translate_expr(only, ctx),
        args => {
            let args: Vec<_> = args.iter().map(|a| translate_expr(a, ctx)).try_collect()?;
            Ok(format!("({})", args.join(connective)))
        }
    }
}

fn translate_switch(switch: &Switch, ctx: &Context) -> Result<String> {
    let mut sql = "CASE".to_string();
    for branch in &switch.branches {
        sql += &format!(
            " WHEN {} THEN {}",
            translate_expr(&branch.case, ctx)?,
            translate_expr(&branch.then, ctx)?
        );
    }
    if let Some(default) = &switch.default {
        sql += &format!(" ELSE {}", translate_expr(default, ctx)?);
    }
    sql += " END";
    Ok(sql)
}

/// A field-keyed predicate. Transforms wrap the column before the
/// condition compares it.
fn translate_filter(filter: &FieldFilter, ctx: &Context) -> Result<String> {
    let column = translate_ident(&filter.field, ctx)?;
    translate_cond(column, &filter.cond, ctx)
}

fn translate_cond(column: String, cond: &FieldCond, ctx: &Context) -> Result<String> {
    match cond {
        FieldCond::Compare { op, value } => translate_comparison(&column, *op, value, ctx),
        FieldCond::Regex(pattern) => translate_regex(&column, pattern, ctx),
        FieldCond::Text(text) => Ok(format!(
            "({column} LIKE {})",
            like_literal(text, true, true, ctx)
        )),
        FieldCond::Apply { func, args, cond } => {
            let column = translate_call(*func, column, args, ctx)?;
            translate_cond(column, cond, ctx)
        }
    }
}

pub(super) fn translate_comparison(
    left: &str,
    op: CompareOp,
    value: &Expr,
    ctx: &Context,
) -> Result<String> {
    let operator = match op {
        CompareOp::Eq | CompareOp::Ne if value.is_null() => {
            let not = if op == CompareOp::Ne { " NOT" } else { "" };
            return Ok(format!("({left} IS{not} NULL)"));
        }
        CompareOp::In | CompareOp::Nin => {
            let not = if op == CompareOp::Nin { " NOT" } else { "" };
            let list = match value {
                Expr::Array(_) | Expr::Query(_) => translate_expr(value, ctx)?,
                value => format!("({})", translate_expr(value, ctx)?),
            };
            return Ok(format!("({left}{not} IN {list})"));
        }
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Gt => ">",
        CompareOp::Gte => ">=",
        CompareOp::Lt => "<",
        CompareOp::Lte => "<=",
    };
    Ok(format!("({left}{operator}{})", translate_expr(value, ctx)?))
}

/// Plain patterns become LIKE; anything else needs the dialect's regex
/// operator.
fn translate_regex(column: &str, pattern: &str, ctx: &Context) -> Result<String> {
    if let Some(plain) = PlainPattern::parse(pattern) {
        let like = like_literal(&plain.text, !plain.anchored_start, !plain.anchored_end, ctx);
        return Ok(format!("({column} LIKE {like})"));
    }

    let Some(operator) = ctx.dialect_handler.regex_operator() else {
        return Err(Error::new_unsupported(
            "regular expression matching",
            format!("sql.{}", ctx.dialect),
        ));
    };
    let pattern = ctx.dialect_handler.translate_string(pattern);
    Ok(format!("({column} {operator} {pattern})"))
}

fn translate_function(func: Func, args: &[Expr], ctx: &Context) -> Result<String> {
    match args.split_first() {
        Some((first, rest)) => {
            let first = translate_expr(first, ctx)?;
            translate_call(func, first, rest, ctx)
        }
        None if func == Func::Now => Ok("CURRENT_TIMESTAMP".to_string()),
        None => Err(arity_error(func, &arity(func), 0)),
    }
}

/// `subject` is the rendered first argument; `args` are the rest.
fn translate_call(func: Func, subject: String, args: &[Expr], ctx: &Context) -> Result<String> {
    let handler = &ctx.dialect_handler;

    let expected = arity(func);
    if !expected.contains(&(args.len() + 1)) {
        return Err(arity_error(func, &expected, args.len() + 1));
    }
    let rendered: Vec<String> = args.iter().map(|a| translate_expr(a, ctx)).try_collect()?;

    Ok(match func {
        Func::Add => format!("({subject} + {})", rendered[0]),
        Func::Subtract => format!("({subject} - {})", rendered[0]),
        Func::Multiply => format!("({subject} * {})", rendered[0]),
        Func::Divide => format!("({subject} / {})", rendered[0]),
        Func::Mod => format!("({subject} % {})", rendered[0]),
        Func::Bit => format!("({subject} & {})", rendered[0]),

        Func::Round => match rendered.first() {
            Some(digits) => format!("ROUND({subject}, {digits})"),
            None => format!("ROUND({subject}, 0)"),
        },
        Func::Floor => format!("FLOOR({subject})"),
        Func::Ceiling => format!("{}({subject})", handler.ceiling_function()),

        Func::Substring => {
            // zero-based start
            let start = match &args[0] {
                Expr::Literal(Literal::Integer(start)) if *start < i64::MAX => {
                    (start + 1).to_string()
                }
                _ => format!("{} + 1", rendered[0]),
            };
            let length = match rendered.get(1) {
                Some(length) => Some(length.clone()),
                None if handler.substring_requires_length() => {
                    Some(format!("{}({subject})", handler.length_function()))
                }
                None => None,
            };
            match length {
                Some(length) => format!(
                    "{}({subject}, {start}, {length})",
                    handler.substring_function()
                ),
                None => format!("{}({subject}, {start})", handler.substring_function()),
            }
        }
        Func::IndexOf => format!(
            "({} - 1)",
            handler.translate_position(&subject, &rendered[0])
        ),
        Func::Concat => {
            let parts = std::iter::once(subject).chain(rendered).collect_vec();
            translate_concat(&parts, ctx)
        }
        Func::Trim => format!("TRIM({subject})"),
        Func::Length => format!("{}({subject})", handler.length_function()),
        Func::ToLower => format!("LOWER({subject})"),
        Func::ToUpper => format!("UPPER({subject})"),

        Func::Contains | Func::StartsWith | Func::EndsWith => {
            let pattern = translate_like_pattern(func, &args[0], &rendered[0], ctx);
            format!("({subject} LIKE {pattern})")
        }

        Func::Date => handler.translate_date(&subject),
        Func::Year | Func::Month | Func::Day | Func::Hour | Func::Minute | Func::Second => {
            handler.translate_date_part(func, &subject)
        }
        Func::Now => "CURRENT_TIMESTAMP".to_string(),

        Func::Count => format!("COUNT({subject})"),
        Func::Min => format!("MIN({subject})"),
        Func::Max => format!("MAX({subject})"),
        Func::Sum => format!("SUM({subject})"),
        Func::Avg => format!("AVG({subject})"),
    })
}

/// Counts include the subject.
fn arity(func: Func) -> RangeInclusive<usize> {
    match func {
        Func::Add
        | Func::Subtract
        | Func::Multiply
        | Func::Divide
        | Func::Mod
        | Func::Bit
        | Func::IndexOf
        | Func::Contains
        | Func::StartsWith
        | Func::EndsWith => 2..=2,
        Func::Round => 1..=2,
        Func::Substring => 2..=3,
        Func::Concat => 2..=usize::MAX,
        Func::Now => 0..=0,
        _ => 1..=1,
    }
}

fn arity_error(func: Func, expected: &RangeInclusive<usize>, found: usize) -> Error {
    let expected = match (expected.start(), expected.end()) {
        (min, &usize::MAX) => format!("at least {min} arguments"),
        (min, max) if min == max => format!("{min} arguments"),
        (min, max) => format!("{min} to {max} arguments"),
    };
    Error::new(Reason::Expected {
        who: Some(format!("${func}")),
        expected,
        found: found.to_string(),
    })
}

fn translate_concat(parts: &[String], ctx: &Context) -> String {
    if ctx.dialect_handler.has_concat_function() {
        format!("CONCAT({})", parts.join(", "))
    } else {
        format!("({})", parts.join(" || "))
    }
}

/// A LIKE pattern matching `text` verbatim, with wildcards around it as
/// asked. Wildcard characters in `text` are escaped with a backslash that is
/// declared through `ESCAPE`.
fn like_literal(text: &str, before: bool, after: bool, ctx: &Context) -> String {
    let handler = &ctx.dialect_handler;
    let needs_escape = text.contains(['%', '_', '\\']);

    let mut pattern = String::with_capacity(text.len() + 2);
    if before {
        pattern.push('%');
    }
    for c in text.chars() {
        if needs_escape && matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    if after {
        pattern.push('%');
    }

    let literal = handler.translate_string(&pattern);
    if needs_escape {
        format!("{literal} ESCAPE {}", handler.translate_string("\\"))
    } else {
        literal
    }
}

/// A constant needle becomes a LIKE literal; any other needle is wrapped in
/// wildcards with the dialect's concatenation.
fn translate_like_pattern(func: Func, needle: &Expr, rendered: &str, ctx: &Context) -> String {
    let (before, after) = match func {
        Func::StartsWith => (false, true),
        Func::EndsWith => (true, false),
        _ => (true, true),
    };

    if let Expr::Literal(Literal::String(text)) = needle {
        return like_literal(text, before, after, ctx);
    }

    let wildcard = ctx.dialect_handler.translate_string("%");
    let mut parts = Vec::new();
    if before {
        parts.push(wildcard.clone());
    }
    parts.push(rendered.to_string());
    if after {
        parts.push(wildcard);
    }
    translate_concat(&parts, ctx)
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;
    use rstest::rstest;

    use super::*;
    use crate::sql::{Dialect, SqlFormatter};

    fn render(expr: &Expr, dialect: Dialect) -> String {
        SqlFormatter::new(dialect).format_where(expr).unwrap()
    }

    #[test]
    fn test_comparisons() {
        let generic = Dialect::Generic;
        assert_snapshot!(render(&Expr::filter("id", CompareOp::Eq, 1.into()), generic), @"(id=1)");
        assert_snapshot!(render(&Expr::filter("id", CompareOp::Ne, 1.into()), generic), @"(id<>1)");
        assert_snapshot!(
            render(&Expr::filter("deleted", CompareOp::Eq, Expr::null()), generic),
            @"(deleted IS NULL)"
        );
        assert_snapshot!(
            render(&Expr::filter("deleted", CompareOp::Ne, Expr::null()), generic),
            @"(deleted IS NOT NULL)"
        );
        assert_snapshot!(
            render(&Expr::filter("id", CompareOp::In, vec![1, 2, 3].into()), generic),
            @"(id IN (1, 2, 3))"
        );
        assert_snapshot!(
            render(&Expr::filter("id", CompareOp::In, Vec::<i64>::new().into()), generic),
            @"(id IN (NULL))"
        );
        assert_snapshot!(
            render(&Expr::filter("id", CompareOp::Nin, vec![4].into()), generic),
            @"(id NOT IN (4))"
        );
    }

    #[test]
    fn test_logical() {
        let and = Expr::Logical {
            op: LogicalOp::And,
            args: vec![
                Expr::filter("a", CompareOp::Eq, 1.into()),
                Expr::Not(Box::new(Expr::Logical {
                    op: LogicalOp::Or,
                    args: vec![
                        Expr::filter("b", CompareOp::Gt, 2.into()),
                        Expr::filter("c", CompareOp::Lte, "x".into()),
                    ],
                })),
            ],
        };
        assert_snapshot!(
            render(&and, Dialect::Generic),
            @"((a=1) AND NOT ((b>2) OR (c<='x')))"
        );

        let single = Expr::Logical {
            op: LogicalOp::Or,
            args: vec![Expr::filter("a", CompareOp::Eq, 1.into())],
        };
        assert_snapshot!(render(&single, Dialect::Generic), @"(a=1)");

        let empty = Expr::Logical {
            op: LogicalOp::And,
            args: vec![],
        };
        let err = SqlFormatter::new(Dialect::Generic)
            .format_where(&empty)
            .unwrap_err();
        assert_snapshot!(err.reason, @"`and` requires at least one argument");
        assert_eq!(err.code, Some("E0004"));
    }

    #[test]
    fn test_transforms() {
        let filter = Expr::Filter(
            crate::ir::Partial::new("price")
                .apply(Func::Add, vec![5.into()])
                .apply(Func::Floor, vec![])
                .complete(FieldCond::compare(CompareOp::Gt, 100.into())),
        );
        assert_snapshot!(render(&filter, Dialect::Generic), @"(FLOOR((price + 5))>100)");
    }

    #[rstest]
    #[case::generic(Dialect::Generic, "(name LIKE 'A%')", "(code REGEXP '^[0-9]+')")]
    #[case::postgres(Dialect::Postgres, r#"("name" LIKE 'A%')"#, r#"("code" ~ '^[0-9]+')"#)]
    #[case::mysql(Dialect::MySql, "(`name` LIKE 'A%')", "(`code` REGEXP '^[0-9]+')")]
    fn test_regex(#[case] dialect: Dialect, #[case] plain: &str, #[case] regex: &str) {
        let starts = Expr::Filter(FieldFilter {
            field: "name".to_string(),
            cond: FieldCond::Regex("^A".to_string()),
        });
        assert_eq!(render(&starts, dialect), plain);

        let digits = Expr::Filter(FieldFilter {
            field: "code".to_string(),
            cond: FieldCond::Regex("^[0-9]+".to_string()),
        });
        assert_eq!(render(&digits, dialect), regex);
    }

    #[rstest]
    #[case::generic(Dialect::Generic, r"(name LIKE '%50\\%%' ESCAPE '\\')")]
    #[case::postgres(Dialect::Postgres, r#"("name" LIKE '%50\%%' ESCAPE '\')"#)]
    #[case::sqlite(Dialect::SQLite, r#"("name" LIKE '%50\%%' ESCAPE '\')"#)]
    #[case::mssql(Dialect::MsSql, r"([name] LIKE '%50\%%' ESCAPE '\')")]
    #[case::mysql(Dialect::MySql, r"(`name` LIKE '%50\\%%' ESCAPE '\\')")]
    fn test_like_escapes_wildcards(#[case] dialect: Dialect, #[case] expected: &str) {
        let contains = Expr::function(Func::Contains, vec![Expr::name("name"), "50%".into()]);
        assert_eq!(render(&contains, dialect), expected);
    }

    #[test]
    fn test_like_without_wildcards() {
        let text = Expr::Filter(FieldFilter {
            field: "name".to_string(),
            cond: FieldCond::Text("phone".to_string()),
        });
        assert_snapshot!(render(&text, Dialect::SQLite), @r#"("name" LIKE '%phone%')"#);

        let underscore = Expr::Filter(FieldFilter {
            field: "code".to_string(),
            cond: FieldCond::Regex("^a_b$".to_string()),
        });
        assert_snapshot!(render(&underscore, Dialect::MsSql), @r"([code] LIKE 'a\_b' ESCAPE '\')");
    }

    #[test]
    fn test_regex_unsupported() {
        let digits = Expr::Filter(FieldFilter {
            field: "code".to_string(),
            cond: FieldCond::Regex(r"\d+".to_string()),
        });
        let err = SqlFormatter::new(Dialect::MsSql)
            .format_where(&digits)
            .unwrap_err();
        assert_snapshot!(err.reason, @"regular expression matching is not supported by sql.mssql");
        assert_eq!(err.code, Some("E0005"));
    }

    #[rstest]
    #[case::generic(Dialect::Generic, "(POSITION('a' IN name) - 1)", "CONCAT(first, ' ', last)", "EXTRACT(YEAR FROM born)")]
    #[case::sqlite(Dialect::SQLite, r#"(INSTR("name", 'a') - 1)"#, r#"("first" || ' ' || "last")"#, r#"CAST(strftime('%Y', "born") AS INTEGER)"#)]
    #[case::mssql(Dialect::MsSql, "(CHARINDEX('a', [name]) - 1)", "CONCAT([first], ' ', [last])", "DATEPART(year, [born])")]
    #[case::mysql(Dialect::MySql, "(LOCATE('a', `name`) - 1)", "CONCAT(`first`, ' ', `last`)", "EXTRACT(YEAR FROM `born`)")]
    fn test_functions(
        #[case] dialect: Dialect,
        #[case] index_of: &str,
        #[case] concat: &str,
        #[case] year: &str,
    ) {
        let call = |func, args: Vec<Expr>| render(&Expr::function(func, args), dialect);

        assert_eq!(call(Func::IndexOf, vec![Expr::name("name"), "a".into()]), index_of);
        assert_eq!(
            call(
                Func::Concat,
                vec![Expr::name("first"), " ".into(), Expr::name("last")]
            ),
            concat
        );
        assert_eq!(call(Func::Year, vec![Expr::name("born")]), year);
    }

    #[test]
    fn test_substring_and_predicates() {
        let substring = Expr::function(Func::Substring, vec![Expr::name("name"), 1.into(), 2.into()]);
        assert_snapshot!(render(&substring, Dialect::Generic), @"SUBSTRING(name, 2, 2)");

        let open = Expr::function(Func::Substring, vec![Expr::name("name"), 1.into()]);
        assert_snapshot!(render(&open, Dialect::MsSql), @"SUBSTRING([name], 2, LEN([name]))");

        let far = Expr::function(Func::Substring, vec![Expr::name("name"), i64::MAX.into()]);
        assert_snapshot!(render(&far, Dialect::Generic), @"SUBSTRING(name, 9223372036854775807 + 1)");

        let contains = Expr::function(Func::Contains, vec![Expr::name("name"), "50%".into()]);
        assert_snapshot!(render(&contains, Dialect::Generic), @r"(name LIKE '%50\\%%' ESCAPE '\\')");

        let ends = Expr::function(Func::EndsWith, vec![Expr::name("name"), Expr::name("suffix")]);
        assert_snapshot!(render(&ends, Dialect::SQLite), @r#"("name" LIKE ('%' || "suffix"))"#);

        let err = SqlFormatter::new(Dialect::Generic)
            .format_where(&Expr::function(Func::ToLower, vec![]))
            .unwrap_err();
        assert_snapshot!(err.reason, @"$toLower expected 1 arguments, but found 0");
    }

    #[test]
    fn test_literals() {
        let datetime = chrono::DateTime::parse_from_rfc3339("2024-03-01T10:30:00+02:00").unwrap();
        let literal = Expr::Literal(Literal::DateTime(datetime));
        assert_snapshot!(render(&literal, Dialect::Generic), @"'2024-03-01 10:30:00.000+02:00'");
        assert_snapshot!(
            render(&literal, Dialect::Postgres),
            @"'2024-03-01 10:30:00.000+02:00'::timestamptz"
        );

        assert_snapshot!(render(&Expr::from(true), Dialect::MsSql), @"1");
        assert_snapshot!(render(&Expr::from(2.0), Dialect::Generic), @"2.0");
        assert_snapshot!(
            render(&Expr::Literal(Literal::Binary("0aff".to_string())), Dialect::Postgres),
            @r"'\x0aff'::bytea"
        );

        let err = SqlFormatter::new(Dialect::Generic)
            .format_where(&Expr::from(f64::NAN))
            .unwrap_err();
        assert_snapshot!(err.reason, @"NaN has no SQL representation");
    }

    #[test]
    fn test_invalid_identifier() {
        let err = SqlFormatter::new(Dialect::Generic)
            .format_where(&Expr::name("name; DROP TABLE x"))
            .unwrap_err();
        assert_snapshot!(err.reason, @"expected a valid identifier, but found `name; DROP TABLE x`");
    }
}
