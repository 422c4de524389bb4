//! Reading L3 source text.
//!
//! Parsing happens in two steps. The nom-based reader turns text into an
//! S-expression datum (a [`Value`] built from numbers, booleans, strings,
//! symbols and lists), which is also exactly what `quote` returns at run time.
//! The L3 parser then turns a datum into a [`Program`] or [`Exp`], resolving
//! special forms and primitive names.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded, terminated},
};
use std::borrow::Cow;

use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::{
    Binding, CExp, ClassExp, DefineExp, Exp, Method, NumberType, ProcExp, Program,
    SYMBOL_SPECIAL_CHARS, is_valid_symbol,
};
use crate::builtinops::find_primitive;
use crate::value::Value;

/// Symbols with special meaning that cannot be used as variable names
const KEYWORDS: &[&str] = &["L3", "define", "if", "lambda", "let", "class", "quote"];

/// Reader options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParseConfig {
    /// Strip `;` line comments before reading
    pub handle_comments: bool,
}

fn parse_error(message: impl Into<String>) -> Error {
    Error::Parse(message.into())
}

/// Convert nom parsing errors to user-friendly messages
fn parse_error_to_message(input: &str, error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::Char => format!("Expected character at position {position}"),
                ErrorKind::Tag => format!("Unexpected token at position {position}"),
                ErrorKind::TooLarge => {
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})")
                }
                _ => {
                    if position < input.len() {
                        let remaining_chars: String =
                            input[position..].chars().take(10).collect();
                        format!("Invalid syntax near '{remaining_chars}'")
                    } else {
                        "Unexpected end of input".into()
                    }
                }
            }
        }
        nom::Err::Incomplete(_) => "Incomplete input".into(),
    }
}

/// Succeeds without consuming input when the next character ends an atom
fn atom_end(input: &str) -> IResult<&str, ()> {
    match input.chars().next() {
        None => Ok((input, ())),
        Some(c) if c.is_whitespace() || "()'\";".contains(c) => Ok((input, ())),
        Some(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Verify,
        ))),
    }
}

/// Parse a number (decimal with optional fraction, or #x hexadecimal)
fn parse_number(input: &str) -> IResult<&str, Value> {
    terminated(alt((parse_hexadecimal, parse_decimal)), atom_end).parse(input)
}

fn parse_decimal(input: &str) -> IResult<&str, Value> {
    let (remaining, number_str) = recognize(pair(
        opt(char('-')),
        pair(digit1, opt(pair(char('.'), digit1))),
    ))
    .parse(input)?;

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((remaining, Value::Number(n))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse a hexadecimal integer (#x or #X prefix)
fn parse_hexadecimal(input: &str) -> IResult<&str, Value> {
    let (remaining, _) = char('#').parse(input)?;
    let (remaining, _) = alt((char('x'), char('X'))).parse(remaining)?;
    let (remaining, hex_digits) = take_while1(|c: char| c.is_ascii_hexdigit()).parse(remaining)?;

    match i64::from_str_radix(hex_digits, 16) {
        Ok(n) => Ok((remaining, Value::Number(n as NumberType))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::HexDigit,
        ))),
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, Value> {
    terminated(
        alt((
            value(Value::Bool(true), tag("#t")),
            value(Value::Bool(false), tag("#f")),
        )),
        atom_end,
    )
    .parse(input)
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let mut symbol_chars =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c));

    let (remaining, candidate) = symbol_chars.parse(input)?;

    if is_valid_symbol(candidate) {
        let (remaining, ()) = atom_end(remaining)?;
        Ok((remaining, Value::Symbol(candidate.into())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Parse a string literal
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::String(chars))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    // Unknown or incomplete escape sequence
                    Some(_) | None => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                // Reached end of input without finding closing quote
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// Parse a list of data
fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('(').parse(input)?;
    let (input, elements) =
        many0(preceded(multispace0, |input| parse_datum(input, depth + 1))).parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char(')').parse(input)?;
    Ok((input, Value::List(elements)))
}

/// Parse quoted datum ('datum -> (quote datum))
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('\'').parse(input)?;
    let (input, datum) = preceded(multispace0, |input| parse_datum(input, depth + 1)).parse(input)?;
    Ok((
        input,
        Value::List(vec![Value::Symbol("quote".into()), datum]),
    ))
}

fn parse_datum(input: &str, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    alt((
        |input| parse_quote(input, depth),
        |input| parse_list(input, depth),
        parse_number,
        parse_bool,
        parse_string,
        parse_symbol,
    ))
    .parse(input)
}

/// Remove `;` comments that are not inside string literals
fn strip_comments(input: &str) -> Cow<'_, str> {
    if !input.contains(';') {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;
    for ch in input.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                output.push(ch);
            }
            continue;
        }
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if ch == ';' {
            in_comment = true;
            continue;
        } else if ch == '"' {
            in_string = true;
        }
        output.push(ch);
    }
    Cow::Owned(output)
}

/// Read exactly one S-expression datum from `input`.
pub fn parse_sexp(input: &str) -> Result<Value, Error> {
    parse_sexp_with_config(input, ParseConfig::default())
}

/// Read one datum with explicit reader options
pub fn parse_sexp_with_config(input: &str, config: ParseConfig) -> Result<Value, Error> {
    let text = if config.handle_comments {
        strip_comments(input)
    } else {
        Cow::Borrowed(input)
    };
    let text = text.as_ref();

    match terminated(preceded(multispace0, |input| parse_datum(input, 0)), multispace0).parse(text)
    {
        Ok(("", datum)) => Ok(datum),
        Ok((remaining, _)) => Err(parse_error(format!(
            "Unexpected remaining input: '{remaining}'"
        ))),
        Err(e) => Err(parse_error(parse_error_to_message(text, e))),
    }
}

/// Parse an `(L3 exp ...)` program from text
pub fn parse_l3(input: &str) -> Result<Program, Error> {
    parse_l3_with_config(input, ParseConfig::default())
}

pub fn parse_l3_with_config(input: &str, config: ParseConfig) -> Result<Program, Error> {
    parse_l3_program(&parse_sexp_with_config(input, config)?)
}

/// Parse a single top-level expression from text
pub fn parse_l3_exp_str(input: &str) -> Result<Exp, Error> {
    parse_l3_exp(&parse_sexp(input)?)
}

/// Parse a program datum: `(L3 exp ...)`
pub fn parse_l3_program(datum: &Value) -> Result<Program, Error> {
    match datum {
        Value::List(elements) => match elements.as_slice() {
            [Value::Symbol(head), exps @ ..] if head == "L3" => Ok(Program {
                exps: exps.iter().map(parse_l3_exp).collect::<Result<_, _>>()?,
            }),
            _ => Err(parse_error("Program must be of the form (L3 exp ...)")),
        },
        _ => Err(parse_error(format!("Program must be a list, got {datum}"))),
    }
}

/// Parse a top-level expression datum (a `define` or a compound expression)
pub fn parse_l3_exp(datum: &Value) -> Result<Exp, Error> {
    if let Value::List(elements) = datum
        && let [Value::Symbol(head), args @ ..] = elements.as_slice()
        && head == "define"
    {
        return parse_define(args).map(Exp::Define);
    }
    parse_l3_cexp(datum).map(Exp::CExp)
}

fn parse_define(args: &[Value]) -> Result<DefineExp, Error> {
    match args {
        [var, val] => Ok(DefineExp {
            var: parse_var_decl(var)?,
            val: parse_l3_cexp(val)?,
        }),
        _ => Err(parse_error("define requires a variable and a value")),
    }
}

/// A binder name: a symbol that is not a keyword
fn parse_var_decl(datum: &Value) -> Result<String, Error> {
    match datum {
        Value::Symbol(name) if KEYWORDS.contains(&name.as_str()) => {
            Err(parse_error(format!("Keyword cannot be used as a variable: {name}")))
        }
        Value::Symbol(name) => Ok(name.clone()),
        other => Err(parse_error(format!("Expected a variable name, got {other}"))),
    }
}

/// A list of distinct binder names
fn parse_var_decls(datum: &Value, what: &str) -> Result<Vec<String>, Error> {
    let Value::List(elements) = datum else {
        return Err(parse_error(format!("{what} must be a list, got {datum}")));
    };
    let mut names: Vec<String> = Vec::with_capacity(elements.len());
    for element in elements {
        let name = parse_var_decl(element)?;
        if names.contains(&name) {
            return Err(parse_error(format!("Duplicate name in {what}: {name}")));
        }
        names.push(name);
    }
    Ok(names)
}

fn parse_body(body: &[Value], form: &str) -> Result<Vec<CExp>, Error> {
    if body.is_empty() {
        return Err(parse_error(format!("{form} body cannot be empty")));
    }
    body.iter().map(parse_l3_cexp).collect()
}

/// Parse a compound expression datum
pub fn parse_l3_cexp(datum: &Value) -> Result<CExp, Error> {
    match datum {
        Value::Number(n) => Ok(CExp::Num(*n)),
        Value::Bool(b) => Ok(CExp::Bool(*b)),
        Value::String(s) => Ok(CExp::Str(s.clone())),
        Value::Symbol(name) => {
            if let Some(op) = find_primitive(name) {
                Ok(CExp::PrimOp(op))
            } else {
                Ok(CExp::VarRef(parse_var_decl(datum)?))
            }
        }
        Value::List(elements) => match elements.as_slice() {
            [] => Err(parse_error("Empty compound expression: ()")),
            [Value::Symbol(head), args @ ..] if KEYWORDS.contains(&head.as_str()) => {
                parse_special_form(head, args)
            }
            [rator, rands @ ..] => Ok(CExp::app(
                parse_l3_cexp(rator)?,
                rands.iter().map(parse_l3_cexp).collect::<Result<_, _>>()?,
            )),
        },
        other => Err(parse_error(format!("Unexpected datum: {other}"))),
    }
}

fn parse_special_form(head: &str, args: &[Value]) -> Result<CExp, Error> {
    match (head, args) {
        ("if", [test, then, alt]) => Ok(CExp::if_exp(
            parse_l3_cexp(test)?,
            parse_l3_cexp(then)?,
            parse_l3_cexp(alt)?,
        )),
        ("if", _) => Err(parse_error("if requires exactly 3 arguments")),
        ("lambda", [params, body @ ..]) => Ok(CExp::Proc(parse_proc(params, body)?)),
        ("let", [bindings, body @ ..]) => Ok(CExp::Let {
            bindings: parse_bindings(bindings)?,
            body: parse_body(body, "let")?,
        }),
        ("class", [fields, methods]) => Ok(CExp::Class(ClassExp {
            fields: parse_var_decls(fields, "class fields")?,
            methods: parse_methods(methods)?,
        })),
        ("class", _) => Err(parse_error("class requires a field list and a method list")),
        ("quote", [datum]) => Ok(CExp::Lit(datum.clone())),
        ("quote", _) => Err(parse_error("quote requires exactly 1 argument")),
        ("define", _) => Err(parse_error("define is only allowed at the top level")),
        (form, _) => Err(parse_error(format!("Malformed {form} expression"))),
    }
}

fn parse_proc(params: &Value, body: &[Value]) -> Result<ProcExp, Error> {
    Ok(ProcExp {
        params: parse_var_decls(params, "lambda parameters")?,
        body: parse_body(body, "lambda")?,
    })
}

fn parse_bindings(datum: &Value) -> Result<Vec<Binding>, Error> {
    let Value::List(elements) = datum else {
        return Err(parse_error(format!("let bindings must be a list, got {datum}")));
    };
    let mut bindings: Vec<Binding> = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            Value::List(pair) if pair.len() == 2 => {
                let var = parse_var_decl(&pair[0])?;
                if bindings.iter().any(|b| b.var == var) {
                    return Err(parse_error(format!("Duplicate name in let bindings: {var}")));
                }
                bindings.push(Binding {
                    var,
                    val: parse_l3_cexp(&pair[1])?,
                });
            }
            other => return Err(parse_error(format!("Malformed let binding: {other}"))),
        }
    }
    Ok(bindings)
}

fn parse_methods(datum: &Value) -> Result<Vec<Method>, Error> {
    let Value::List(elements) = datum else {
        return Err(parse_error(format!("class methods must be a list, got {datum}")));
    };
    elements
        .iter()
        .map(|element| match element {
            Value::List(pair) if pair.len() == 2 => {
                let Value::Symbol(name) = &pair[0] else {
                    return Err(parse_error(format!(
                        "Method name must be a symbol, got {}",
                        pair[0]
                    )));
                };
                match parse_l3_cexp(&pair[1])? {
                    CExp::Proc(proc) => Ok(Method {
                        name: name.clone(),
                        proc,
                    }),
                    other => Err(parse_error(format!(
                        "Method body must be a lambda expression: {other}"
                    ))),
                }
            }
            other => Err(parse_error(format!("Malformed method: {other}"))),
        })
        .collect()
}
