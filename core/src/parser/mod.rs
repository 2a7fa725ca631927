//! PEST-based parser for Stasis scripts
//!
//! Produces the AST consumed by the compiler, with span information for error reporting.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::executor::types::ast::{
    BinaryOp, Expr, ForLoopKind, FunctionDecl, LogicalOp, MemberAccess, ScriptDef, Span, Stmt,
    UnaryOp, VarKind,
};

pub mod resolve;
pub mod semantic_validator;

#[cfg(test)]
mod tests;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/script.pest"]
struct ScriptParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("{0}")]
    PestError(String, Option<Span>),
    #[error("{0}")]
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        let err = err.renamed_rules(describe_rule);
        ParseError::PestError(err.variant.message().to_string(), span)
    }
}

/// Human-readable names for the rules pest reports as expected
fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".to_string(),
        Rule::identifier => "identifier".to_string(),
        Rule::expression => "expression".to_string(),
        Rule::statement => "statement".to_string(),
        Rule::block => "block".to_string(),
        other => format!("{:?}", other),
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = offset_to_line_col(source, start);
    let (end_line, end_col) = offset_to_line_col(source, end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/// Convert byte offset to (line, column) - 0-indexed
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/* ===================== Pair Helpers ===================== */

fn is_keyword_token(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_function
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_while
            | Rule::kw_for
            | Rule::kw_return
            | Rule::kw_throw
            | Rule::kw_try
            | Rule::kw_catch
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_await
            | Rule::kw_async
    )
}

/// Children of a pair with keyword tokens filtered out
fn significant(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword_token(p.as_rule()))
}

/// Take the next child, or fail with a build error naming what was expected
fn next_pair<'i>(
    inner: &mut impl Iterator<Item = Pair<'i, Rule>>,
    what: &str,
    span: Span,
) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Expected {}", what), Some(span)))
}

/* ===================== Public API ===================== */

/// Parse a script source string into a script definition
pub fn parse_script(source: &str) -> ParseResult<ScriptDef> {
    let mut pairs: Pairs<Rule> = ScriptParser::parse(Rule::program, source)?;
    let program_span = Span::new(0, source.len(), 0, 0, 0, 0);
    let program = next_pair(&mut pairs, "program", program_span)?;
    let program_span = pair_to_span(&program, source);

    let mut functions = Vec::new();
    let mut statements = Vec::new();

    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::function_decl => functions.push(build_function_decl(pair, source)?),
            Rule::statement => statements.push(build_statement(pair, source)?),
            Rule::EOI => {}
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected program content: {:?}", other),
                    Some(pair_to_span(&pair, source)),
                ))
            }
        }
    }

    let body_span = match (statements.first(), statements.last()) {
        (Some(first), Some(last)) => first.span().merge(&last.span()),
        _ => program_span,
    };

    Ok(ScriptDef {
        functions,
        body: Stmt::Block {
            body: statements,
            span: body_span,
        },
        span: program_span,
    })
}

/// Parse a single expression (testing and tooling API)
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let mut pairs = ScriptParser::parse(Rule::expression, source)?;
    let span = Span::new(0, source.len(), 0, 0, 0, 0);
    let pair = next_pair(&mut pairs, "expression", span)?;
    if pair.as_span().end() != source.trim_end().len() {
        return Err(ParseError::BuildError(
            "Unexpected trailing input after expression".to_string(),
            Some(span),
        ));
    }
    build_expression(pair, source)
}

/* ===================== AST Builder ===================== */

fn build_function_decl(pair: Pair<Rule>, source: &str) -> ParseResult<FunctionDecl> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let name = next_pair(&mut inner, "function name", span)?.as_str().to_string();

    let mut params = Vec::new();
    let mut body = None;
    for part in inner {
        match part.as_rule() {
            Rule::param_list => {
                params.extend(part.into_inner().map(|p| p.as_str().to_string()));
            }
            Rule::block => body = Some(build_block(part, source)?),
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected function content: {:?}", other),
                    Some(span),
                ))
            }
        }
    }

    let body = body.ok_or_else(|| {
        ParseError::BuildError(format!("Function '{}' has no body", name), Some(span))
    })?;

    Ok(FunctionDecl {
        name,
        params,
        body,
        span,
    })
}

fn build_block(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let statements: Result<Vec<Stmt>, ParseError> = pair
        .into_inner()
        .map(|stmt_pair| build_statement(stmt_pair, source))
        .collect();

    Ok(Stmt::Block {
        body: statements?,
        span,
    })
}

fn build_var_kind(pair: &Pair<Rule>, source: &str) -> ParseResult<VarKind> {
    match pair.as_str() {
        "let" => Ok(VarKind::Let),
        "const" => Ok(VarKind::Const),
        other => Err(ParseError::BuildError(
            format!("Expected 'let' or 'const', got: {}", other),
            Some(pair_to_span(pair, source)),
        )),
    }
}

fn build_if_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let test = build_expression(next_pair(&mut inner, "condition", span)?, source)?;
    let then_s = build_statement(next_pair(&mut inner, "statement", span)?, source)?;

    let else_s = match inner.next() {
        Some(else_clause) => {
            let mut else_inner = significant(else_clause);
            let stmt = next_pair(&mut else_inner, "else statement", span)?;
            Some(Box::new(build_statement(stmt, source)?))
        }
        None => None,
    };

    Ok(Stmt::If {
        test,
        then_s: Box::new(then_s),
        else_s,
        span,
    })
}

fn build_while_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let test = build_expression(next_pair(&mut inner, "condition", span)?, source)?;
    let body = build_statement(next_pair(&mut inner, "loop body", span)?, source)?;

    Ok(Stmt::While {
        test,
        body: Box::new(body),
        span,
    })
}

fn build_for_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    // Loop bindings are fresh per iteration, so let and const behave the same
    let kind_pair = next_pair(&mut inner, "'let' or 'const'", span)?;
    build_var_kind(&kind_pair, source)?;

    let binding = next_pair(&mut inner, "loop binding", span)?
        .as_str()
        .to_string();

    let kind_pair = next_pair(&mut inner, "'of' or 'in'", span)?;
    let kind = match kind_pair.as_str() {
        "of" => ForLoopKind::Of,
        "in" => ForLoopKind::In,
        other => {
            return Err(ParseError::BuildError(
                format!("Expected 'of' or 'in', got: {}", other),
                Some(pair_to_span(&kind_pair, source)),
            ))
        }
    };

    let iterable = build_expression(next_pair(&mut inner, "iterable", span)?, source)?;
    let body = build_statement(next_pair(&mut inner, "loop body", span)?, source)?;

    Ok(Stmt::ForLoop {
        kind,
        binding,
        iterable,
        body: Box::new(body),
        span,
    })
}

fn build_declare_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let var_kind = build_var_kind(&next_pair(&mut inner, "'let' or 'const'", span)?, source)?;
    let name = next_pair(&mut inner, "variable name", span)?
        .as_str()
        .to_string();

    let init = match inner.next() {
        Some(expr_pair) => Some(build_expression(expr_pair, source)?),
        None => None,
    };

    if var_kind == VarKind::Const && init.is_none() {
        return Err(ParseError::BuildError(
            format!("Missing initializer in const declaration '{}'", name),
            Some(span),
        ));
    }

    Ok(Stmt::Declare {
        var_kind,
        name,
        init,
        span,
    })
}

fn build_try_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let body = build_block(next_pair(&mut inner, "try block", span)?, source)?;
    let catch_var = next_pair(&mut inner, "catch binding", span)?
        .as_str()
        .to_string();
    let catch_body = build_block(next_pair(&mut inner, "catch block", span)?, source)?;

    Ok(Stmt::Try {
        body: Box::new(body),
        catch_var,
        catch_body: Box::new(catch_body),
        span,
    })
}

fn build_assign_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let var = next_pair(&mut inner, "assignment target", span)?
        .as_str()
        .to_string();

    let mut path = Vec::new();
    let mut value = None;

    for pair in inner {
        match pair.as_rule() {
            Rule::assign_path_segment => {
                let segment_span = pair_to_span(&pair, source);
                let segment = next_pair(&mut pair.into_inner(), "path segment", segment_span)?;
                match segment.as_rule() {
                    Rule::property_name => path.push(MemberAccess::Prop {
                        property: segment.as_str().to_string(),
                        span: segment_span,
                    }),
                    _ => path.push(MemberAccess::Index {
                        expr: build_expression(segment, source)?,
                        span: segment_span,
                    }),
                }
            }
            Rule::expression => {
                value = Some(build_expression(pair, source)?);
                break;
            }
            _ => {}
        }
    }

    let value = value.ok_or_else(|| {
        ParseError::BuildError("Assignment is missing a value".to_string(), Some(span))
    })?;

    Ok(Stmt::Assign {
        var,
        path,
        value,
        span,
    })
}

fn build_statement(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::statement => {
            let inner = next_pair(&mut pair.into_inner(), "statement", span)?;
            build_statement(inner, source)
        }
        Rule::return_stmt => {
            let value = match significant(pair).next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Return { value, span })
        }
        Rule::throw_stmt => {
            let expr_pair = next_pair(&mut significant(pair), "thrown value", span)?;
            Ok(Stmt::Throw {
                value: build_expression(expr_pair, source)?,
                span,
            })
        }
        Rule::if_stmt => build_if_stmt(pair, source),
        Rule::while_stmt => build_while_stmt(pair, source),
        Rule::for_stmt => build_for_stmt(pair, source),
        Rule::try_stmt => build_try_stmt(pair, source),
        Rule::break_stmt => Ok(Stmt::Break { span }),
        Rule::continue_stmt => Ok(Stmt::Continue { span }),
        Rule::block => build_block(pair, source),
        Rule::declare_stmt => build_declare_stmt(pair, source),
        Rule::assign_stmt => build_assign_stmt(pair, source),
        Rule::expr_stmt => {
            let expr_pair = next_pair(&mut pair.into_inner(), "expression", span)?;
            let expr = build_expression(expr_pair, source)?;
            Ok(Stmt::Expr { expr, span })
        }
        other => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", other),
            Some(span),
        )),
    }
}

fn build_binary_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let mut left = build_expression(next_pair(&mut inner, "operand", span)?, source)?;

    while let Some(op_pair) = inner.next() {
        let op_rule = op_pair.as_rule();
        let right_pair = next_pair(&mut inner, "right operand after operator", span)?;
        let right = build_expression(right_pair, source)?;
        let new_span = left.span().merge(&right.span());

        let logical = match op_rule {
            Rule::op_and => Some(LogicalOp::And),
            Rule::op_or => Some(LogicalOp::Or),
            Rule::op_nullish => Some(LogicalOp::Nullish),
            _ => None,
        };

        left = match logical {
            Some(op) => Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: new_span,
            },
            None => {
                let op = match op_rule {
                    Rule::op_eq => BinaryOp::Eq,
                    Rule::op_ne => BinaryOp::Ne,
                    Rule::op_lt => BinaryOp::Lt,
                    Rule::op_lte => BinaryOp::Le,
                    Rule::op_gt => BinaryOp::Gt,
                    Rule::op_gte => BinaryOp::Ge,
                    Rule::op_add => BinaryOp::Add,
                    Rule::op_sub => BinaryOp::Sub,
                    Rule::op_mul => BinaryOp::Mul,
                    Rule::op_div => BinaryOp::Div,
                    Rule::op_mod => BinaryOp::Mod,
                    other => {
                        return Err(ParseError::BuildError(
                            format!("Expected operator, got {:?}", other),
                            Some(span),
                        ))
                    }
                };
                Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span: new_span,
                }
            }
        };
    }

    Ok(left)
}

fn build_unary_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut ops = Vec::new();
    let mut operand = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::op_not => ops.push(UnaryOp::Not),
            Rule::op_neg => ops.push(UnaryOp::Neg),
            _ => operand = Some(build_expression(part, source)?),
        }
    }

    let mut expr = operand.ok_or_else(|| {
        ParseError::BuildError("Unary operator is missing an operand".to_string(), Some(span))
    })?;

    // Apply innermost operator first
    for op in ops.into_iter().rev() {
        expr = match (op, expr) {
            (UnaryOp::Neg, Expr::LitInt { v, .. }) if v != i64::MIN => Expr::LitInt { v: -v, span },
            (UnaryOp::Neg, Expr::LitFloat { v, .. }) => Expr::LitFloat { v: -v, span },
            (op, operand) => Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            },
        };
    }

    Ok(expr)
}

fn build_postfix_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let mut expr = build_expression(next_pair(&mut inner, "primary expression", span)?, source)?;

    for postfix in inner {
        let postfix_span = pair_to_span(&postfix, source);
        let new_span = expr.span().merge(&postfix_span);

        expr = match postfix.as_rule() {
            Rule::call_suffix => {
                let (args, kwargs) = match postfix.into_inner().next() {
                    Some(arg_list) => build_arg_list(arg_list, source)?,
                    None => (vec![], vec![]),
                };
                Expr::Call {
                    callee: Box::new(expr),
                    args,
                    kwargs,
                    span: new_span,
                }
            }
            Rule::member_access => {
                let prop = next_pair(&mut postfix.into_inner(), "property name", postfix_span)?;
                Expr::Member {
                    object: Box::new(expr),
                    property: prop.as_str().to_string(),
                    span: new_span,
                }
            }
            Rule::index_access => {
                let index = next_pair(&mut postfix.into_inner(), "index", postfix_span)?;
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(build_expression(index, source)?),
                    span: new_span,
                }
            }
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected postfix rule: {:?}", other),
                    Some(postfix_span),
                ))
            }
        };
    }

    Ok(expr)
}

fn build_expression(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::expression => {
            let inner = next_pair(&mut pair.into_inner(), "expression", span)?;
            build_expression(inner, source)
        }
        Rule::ternary_expr => {
            let mut inner = pair.into_inner();
            let condition = build_expression(next_pair(&mut inner, "condition", span)?, source)?;

            match inner.next() {
                Some(consequent_pair) => {
                    let consequent = build_expression(consequent_pair, source)?;
                    let alternate =
                        build_expression(next_pair(&mut inner, "':' branch", span)?, source)?;
                    Ok(Expr::Ternary {
                        condition: Box::new(condition),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                        span,
                    })
                }
                None => Ok(condition),
            }
        }
        Rule::nullish_expr
        | Rule::logical_or_expr
        | Rule::logical_and_expr
        | Rule::equality_expr
        | Rule::comparison_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr => build_binary_expr(pair, source),
        Rule::unary_expr => build_unary_expr(pair, source),
        Rule::await_expr => {
            let inner = next_pair(&mut significant(pair), "awaited expression", span)?;
            Ok(Expr::Await {
                inner: Box::new(build_expression(inner, source)?),
                span,
            })
        }
        Rule::async_expr => {
            let inner = next_pair(&mut significant(pair), "call after 'async'", span)?;
            Ok(Expr::Async {
                call: Box::new(build_expression(inner, source)?),
                span,
            })
        }
        Rule::postfix_expr => build_postfix_expr(pair, source),
        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::number => build_number(pair.as_str(), span),
        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
            span,
        }),
        Rule::string => Ok(Expr::LitStr {
            v: build_string(pair, span)?,
            span,
        }),
        Rule::null_lit => Ok(Expr::LitNull { span }),
        Rule::object_lit => build_object_literal(pair, source),
        Rule::array_lit => {
            let elements: Result<Vec<Expr>, ParseError> = pair
                .into_inner()
                .map(|p| build_expression(p, source))
                .collect();
            Ok(Expr::LitList {
                elements: elements?,
                span,
            })
        }
        other => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", other),
            Some(span),
        )),
    }
}

fn build_number(text: &str, span: Span) -> ParseResult<Expr> {
    if text.contains(['.', 'e', 'E']) {
        let v = text.parse::<f64>().map_err(|e| {
            ParseError::BuildError(
                format!("Failed to parse number '{}': {}", text, e),
                Some(span),
            )
        })?;
        return Ok(Expr::LitFloat { v, span });
    }

    let v = text.parse::<i64>().map_err(|_| {
        ParseError::BuildError(
            format!("Integer literal '{}' is out of range", text),
            Some(span),
        )
    })?;
    Ok(Expr::LitInt { v, span })
}

fn build_string(pair: Pair<Rule>, span: Span) -> ParseResult<String> {
    let raw = next_pair(&mut pair.into_inner(), "string contents", span)?;
    let mut out = String::with_capacity(raw.as_str().len());
    let mut chars = raw.as_str().chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {
                return Err(ParseError::BuildError(
                    "Unterminated escape sequence".to_string(),
                    Some(span),
                ))
            }
        }
    }

    Ok(out)
}

fn build_arg_list(
    pair: Pair<Rule>,
    source: &str,
) -> ParseResult<(Vec<Expr>, Vec<(String, Expr)>)> {
    let mut args = Vec::new();
    let mut kwargs = Vec::new();

    for arg in pair.into_inner() {
        let span = pair_to_span(&arg, source);
        match arg.as_rule() {
            Rule::kwarg => {
                let mut inner = arg.into_inner();
                let name = next_pair(&mut inner, "keyword name", span)?
                    .as_str()
                    .to_string();
                let value = build_expression(next_pair(&mut inner, "keyword value", span)?, source)?;
                kwargs.push((name, value));
            }
            _ => {
                if !kwargs.is_empty() {
                    return Err(ParseError::BuildError(
                        "Positional argument follows keyword argument".to_string(),
                        Some(span),
                    ));
                }
                args.push(build_expression(arg, source)?);
            }
        }
    }

    Ok((args, kwargs))
}

fn build_object_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut properties = Vec::new();

    for property in pair.into_inner() {
        let prop_span = pair_to_span(&property, source);
        let mut inner = property.into_inner();
        let key_pair = next_pair(&mut inner, "property key", prop_span)?;
        let key = match key_pair.as_rule() {
            Rule::string => build_string(key_pair, prop_span)?,
            _ => key_pair.as_str().to_string(),
        };
        let value = build_expression(next_pair(&mut inner, "property value", prop_span)?, source)?;
        properties.push((key, value));
    }

    Ok(Expr::LitObj { properties, span })
}
