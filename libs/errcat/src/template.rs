//! A small text template language for annotation prefixes.
//!
//! The syntax is a subset of Go's `text/template`, which is what error
//! annotations have historically been written in:
//!
//! * `{{.key}}` substitutes a variable from the [`Scope`],
//! * `{{.key | quote}}` and `{{quote .key}}` apply a [`Transform`],
//! * `{{"literal"}}` and `` {{`raw`}} `` are string operands,
//! * `{{.}}` prints the whole scope,
//! * `{{/* comment */}}` renders nothing,
//! * `{{- ` and ` -}}` trim whitespace around an action.
//!
//! Error messages follow `text/template` wording so rendered placeholders
//! look familiar: `template: :1: function "func" not defined`.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Text printed for a variable that is not in scope.
pub const NO_VALUE: &str = "<no value>";

/// Failure to parse or execute a template.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template: :{line}: {message}")]
    Parse { line: usize, message: String },
    #[error("template: :{line}:{column}: executing \"\" at <{node}>: {message}")]
    Exec {
        line: usize,
        column: usize,
        node: String,
        message: String,
    },
}

/// What a reference to an undefined variable renders as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKey {
    /// Render [`NO_VALUE`].
    #[default]
    Default,
    /// Render an empty string.
    Zero,
    /// Fail execution.
    Error,
}

/// Variables visible to a template.
///
/// Built from an ordered list of pairs; a key given twice takes its last
/// value.
#[derive(Debug, Clone, Default)]
pub struct Scope<'a> {
    vars: BTreeMap<&'a str, &'a str>,
}

impl<'a> Scope<'a> {
    #[must_use]
    pub fn from_pairs(pairs: &[(&'a str, &'a str)]) -> Self {
        Self {
            vars: pairs.iter().copied().collect(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.vars.get(key).copied()
    }
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("map[")?;
        for (i, (k, v)) in self.vars.iter().enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }
            write!(f, "{k}:{v}")?;
        }
        f.write_char(']')
    }
}

type TransformFn = dyn Fn(&[&str]) -> String + Send + Sync;

/// A named value transform usable in pipelines.
#[derive(Clone)]
pub struct Transform {
    arity: usize,
    apply: Arc<TransformFn>,
}

impl Transform {
    #[must_use]
    pub fn new(arity: usize, apply: impl Fn(&[&str]) -> String + Send + Sync + 'static) -> Self {
        Self {
            arity,
            apply: Arc::new(apply),
        }
    }

    /// A transform taking exactly one string.
    #[must_use]
    pub fn unary(apply: fn(&str) -> String) -> Self {
        Self::new(1, move |args| args.first().map_or_else(String::new, |s| apply(s)))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// The table of transforms a template may call.
///
/// [`Transforms::default`] holds the built-ins: `quote`, `upper`, `lower`
/// and `trim`.
#[derive(Debug, Clone)]
pub struct Transforms {
    table: BTreeMap<String, Transform>,
}

impl Transforms {
    /// A table with no transforms at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// Register (or replace) a transform.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, transform: Transform) -> Self {
        self.table.insert(name.into(), transform);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.table.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

impl Default for Transforms {
    fn default() -> Self {
        Self::empty()
            .with("quote", Transform::unary(quote))
            .with("upper", Transform::unary(str::to_uppercase))
            .with("lower", Transform::unary(str::to_lowercase))
            .with("trim", Transform::unary(|s| s.trim().to_owned()))
    }
}

/// Double-quote a string, escaping it the way Go's `strconv.Quote` does.
#[must_use]
pub fn quote(s: &str) -> String {
    Quoted(s).to_string()
}

struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                '\u{7}' => f.write_str("\\a")?,
                '\u{8}' => f.write_str("\\b")?,
                '\u{c}' => f.write_str("\\f")?,
                '\u{b}' => f.write_str("\\v")?,
                c if c.is_control() => {
                    let code = u32::from(c);
                    if code <= 0xff {
                        write!(f, "\\x{code:02x}")?;
                    } else {
                        write!(f, "\\u{code:04x}")?;
                    }
                }
                c => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }
}

#[derive(Clone)]
enum TermKind {
    Field(String),
    Dot,
    Str(String),
    Func(Transform),
}

#[derive(Clone)]
struct Term {
    kind: TermKind,
    src: String,
    line: usize,
    column: usize,
}

#[derive(Clone)]
struct Command {
    head: Term,
    args: Vec<Term>,
}

#[derive(Clone)]
enum Node {
    Text(String),
    Action(Vec<Command>),
}

/// A parsed template.
#[derive(Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

enum Value<'a> {
    Str(Cow<'a, str>),
    Missing,
    Scope,
}

impl Template {
    /// Parse `src`, resolving function names against `transforms`.
    ///
    /// # Errors
    /// Returns [`TemplateError::Parse`] for malformed actions and for calls to
    /// functions that are not in `transforms`.
    pub fn parse(src: &str, transforms: &Transforms) -> Result<Self, TemplateError> {
        let nodes = Parser {
            src,
            pos: 0,
            transforms,
        }
        .parse()?;
        Ok(Self { nodes })
    }

    /// Render against `scope`.
    ///
    /// # Errors
    /// Returns [`TemplateError::Exec`] when a transform is called with the
    /// wrong number of arguments or with a value that is not a string, and
    /// for undefined variables under [`MissingKey::Error`].
    pub fn render(&self, scope: &Scope<'_>, missing: MissingKey) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipeline) => {
                    match exec_pipeline(pipeline, scope, missing)? {
                        Value::Str(s) => out.push_str(&s),
                        Value::Missing => out.push_str(NO_VALUE),
                        Value::Scope => out.push_str(&scope.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Parse and render in one go; any failure is embedded in the output as
/// `[[<error>]]` instead of being returned.
#[must_use]
pub fn render_or_placeholder(
    src: &str,
    scope: &Scope<'_>,
    transforms: &Transforms,
    missing: MissingKey,
) -> String {
    let rendered = Template::parse(src, transforms).and_then(|t| t.render(scope, missing));
    match rendered {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, template = src, "template failed; embedding diagnostic");
            format!("[[{e}]]")
        }
    }
}

fn exec_pipeline<'s>(
    pipeline: &[Command],
    scope: &Scope<'s>,
    missing: MissingKey,
) -> Result<Value<'s>, TemplateError> {
    let mut piped: Option<Value<'s>> = None;
    for command in pipeline {
        let value = match &command.head.kind {
            TermKind::Func(transform) => {
                let mut args = Vec::with_capacity(command.args.len() + 1);
                for arg in &command.args {
                    args.push(eval_term(arg, scope, missing)?);
                }
                if let Some(prev) = piped.take() {
                    args.push(prev);
                }
                call(&command.head, transform, &args)?
            }
            _ => eval_term(&command.head, scope, missing)?,
        };
        piped = Some(value);
    }
    Ok(piped.unwrap_or(Value::Missing))
}

fn eval_term<'s>(
    term: &Term,
    scope: &Scope<'s>,
    missing: MissingKey,
) -> Result<Value<'s>, TemplateError> {
    match &term.kind {
        TermKind::Field(name) => match (scope.get(name), missing) {
            (Some(v), _) => Ok(Value::Str(Cow::Borrowed(v))),
            (None, MissingKey::Default) => Ok(Value::Missing),
            (None, MissingKey::Zero) => Ok(Value::Str(Cow::Borrowed(""))),
            (None, MissingKey::Error) => Err(exec_error(
                term,
                format!("map has no entry for key {}", quote(name)),
            )),
        },
        TermKind::Dot => Ok(Value::Scope),
        TermKind::Str(s) => Ok(Value::Str(Cow::Owned(s.clone()))),
        TermKind::Func(transform) => call(term, transform, &[]),
    }
}

fn call<'s>(
    term: &Term,
    transform: &Transform,
    args: &[Value<'s>],
) -> Result<Value<'s>, TemplateError> {
    if args.len() != transform.arity {
        return Err(exec_error(
            term,
            format!(
                "wrong number of args for {}: want {} got {}",
                term.src,
                transform.arity,
                args.len()
            ),
        ));
    }
    let mut strs = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Str(s) => strs.push(s.as_ref()),
            Value::Missing => {
                return Err(exec_error(term, "invalid value; expected string".to_owned()));
            }
            Value::Scope => {
                return Err(exec_error(
                    term,
                    "wrong type for value; expected string; got map[string]string".to_owned(),
                ));
            }
        }
    }
    Ok(Value::Str(Cow::Owned((transform.apply)(strs.as_slice()))))
}

fn exec_error(term: &Term, message: String) -> TemplateError {
    TemplateError::Exec {
        line: term.line,
        column: term.column,
        node: term.src.clone(),
        message,
    }
}

struct Parser<'s, 't> {
    src: &'s str,
    pos: usize,
    transforms: &'t Transforms,
}

impl Parser<'_, '_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn line_at(&self, pos: usize) -> usize {
        self.src[..pos].matches('\n').count() + 1
    }

    fn column_at(&self, pos: usize) -> usize {
        self.src[..pos].rfind('\n').map_or(pos, |nl| pos - nl - 1)
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::Parse {
            line: self.line_at(pos),
            message: message.into(),
        }
    }

    fn skip_space(&mut self) {
        let skipped = self.rest().len() - self.rest().trim_start().len();
        self.pos += skipped;
    }

    fn parse(mut self) -> Result<Vec<Node>, TemplateError> {
        let mut nodes = Vec::new();
        let mut trim_next = false;
        loop {
            let rest = &self.src[self.pos..];
            let Some(open) = rest.find("{{") else {
                push_text(&mut nodes, rest, trim_next, false);
                return Ok(nodes);
            };
            let text = &rest[..open];
            let action_start = self.pos + open;
            self.pos = action_start + 2;

            let after = self.rest();
            let trim_left = after.starts_with('-')
                && after[1..].starts_with(|c: char| c.is_ascii_whitespace());
            if trim_left {
                self.pos += 1;
            }
            push_text(&mut nodes, text, trim_next, trim_left);
            self.skip_space();

            if self.rest().starts_with("/*") {
                trim_next = self.comment(action_start)?;
                continue;
            }
            let (pipeline, trim_right) = self.pipeline(action_start)?;
            nodes.push(Node::Action(pipeline));
            trim_next = trim_right;
        }
    }

    /// Consumes a closing delimiter at the current position, if any.
    /// Returns `Some(trim)` when one was found.
    fn close(&mut self) -> Option<bool> {
        let rest = self.rest();
        if rest.starts_with("}}") {
            self.pos += 2;
            return Some(false);
        }
        let spaced = self.src[..self.pos].ends_with(|c: char| c.is_ascii_whitespace());
        if spaced && rest.starts_with("-}}") {
            self.pos += 3;
            return Some(true);
        }
        None
    }

    fn comment(&mut self, action_start: usize) -> Result<bool, TemplateError> {
        let Some(end) = self.rest().find("*/") else {
            return Err(self.error(action_start, "unclosed comment"));
        };
        self.pos += end + 2;
        self.skip_space();
        self.close()
            .ok_or_else(|| self.error(action_start, "comment ends before closing delimiter"))
    }

    fn pipeline(&mut self, action_start: usize) -> Result<(Vec<Command>, bool), TemplateError> {
        let mut stages: Vec<Vec<Term>> = Vec::new();
        let mut current: Vec<Term> = Vec::new();
        let trim = loop {
            self.skip_space();
            if self.rest().is_empty() {
                return Err(self.error(action_start, "unclosed action"));
            }
            if let Some(trim) = self.close() {
                break trim;
            }
            let start = self.pos;
            let Some(c) = self.rest().chars().next() else {
                return Err(self.error(action_start, "unclosed action"));
            };
            match c {
                '|' => {
                    self.pos += 1;
                    if current.is_empty() {
                        return Err(self.error(start, "missing value for command"));
                    }
                    stages.push(std::mem::take(&mut current));
                }
                '.' => current.push(self.field(start)?),
                '"' => current.push(self.quoted(start)?),
                '`' => current.push(self.raw(start)?),
                c if c.is_alphabetic() || c == '_' => current.push(self.ident(start)?),
                c => {
                    return Err(self.error(
                        start,
                        format!("unrecognized character in action: U+{:04X} '{c}'", u32::from(c)),
                    ));
                }
            }
        };
        if current.is_empty() {
            return Err(self.error(action_start, "missing value for command"));
        }
        stages.push(current);

        let mut commands = Vec::with_capacity(stages.len());
        for (i, mut terms) in stages.into_iter().enumerate() {
            let head = terms.remove(0);
            let is_func = matches!(head.kind, TermKind::Func(..));
            if !is_func && (i > 0 || !terms.is_empty()) {
                return Err(TemplateError::Parse {
                    line: head.line,
                    message: format!("can't give argument to non-function {}", head.src),
                });
            }
            commands.push(Command { head, args: terms });
        }
        Ok((commands, trim))
    }

    fn term(&self, start: usize, kind: TermKind) -> Term {
        Term {
            kind,
            src: self.src[start..self.pos].to_owned(),
            line: self.line_at(start),
            column: self.column_at(start),
        }
    }

    fn word_len(&self) -> usize {
        self.rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len())
    }

    fn field(&mut self, start: usize) -> Result<Term, TemplateError> {
        self.pos += 1;
        let len = self.word_len();
        if len == 0 {
            return Ok(self.term(start, TermKind::Dot));
        }
        let name = self.rest()[..len].to_owned();
        self.pos += len;
        if self.rest().starts_with('.') {
            return Err(self.error(
                start,
                format!("can't evaluate field chain {}", &self.src[start..=self.pos]),
            ));
        }
        Ok(self.term(start, TermKind::Field(name)))
    }

    fn ident(&mut self, start: usize) -> Result<Term, TemplateError> {
        let len = self.word_len();
        let name = self.rest()[..len].to_owned();
        self.pos += len;
        let Some(transform) = self.transforms.get(&name) else {
            return Err(self.error(start, format!("function {} not defined", quote(&name))));
        };
        let transform = transform.clone();
        Ok(self.term(start, TermKind::Func(transform)))
    }

    fn quoted(&mut self, start: usize) -> Result<Term, TemplateError> {
        self.pos += 1;
        let mut value = String::new();
        let mut chars = self.rest().char_indices();
        loop {
            let Some((i, c)) = chars.next() else {
                return Err(self.error(start, "unterminated quoted string"));
            };
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(self.term(start, TermKind::Str(value)));
                }
                '\n' => return Err(self.error(start, "unterminated quoted string")),
                '\\' => match chars.next().map(|(_, c)| c) {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        return Err(self.error(
                            start,
                            format!("invalid syntax: unknown escape \\{other}"),
                        ));
                    }
                    None => return Err(self.error(start, "unterminated quoted string")),
                },
                c => value.push(c),
            }
        }
    }

    fn raw(&mut self, start: usize) -> Result<Term, TemplateError> {
        self.pos += 1;
        let Some(end) = self.rest().find('`') else {
            return Err(self.error(start, "unterminated raw quoted string"));
        };
        let value = self.rest()[..end].to_owned();
        self.pos += end + 1;
        Ok(self.term(start, TermKind::Str(value)))
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_owned()));
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn render(src: &str, pairs: &[(&str, &str)]) -> String {
        render_or_placeholder(
            src,
            &Scope::from_pairs(pairs),
            &Transforms::default(),
            MissingKey::Default,
        )
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("more msg", &[]), "more msg");
        assert_eq!(render("", &[]), "");
    }

    #[test]
    fn substitutes_variables() {
        assert_eq!(
            render("using {{.tmpl}}", &[("tmpl", "templated details")]),
            "using templated details"
        );
        assert_eq!(render("{{ .a }}-{{.b}}", &[("a", "1"), ("b", "2")]), "1-2");
    }

    #[test]
    fn later_pairs_win() {
        assert_eq!(render("{{.a}}", &[("a", "1"), ("a", "2")]), "2");
    }

    #[test]
    fn pipes_apply_transforms() {
        assert_eq!(
            render("using {{.tmpl|quote}}", &[("tmpl", "templated details")]),
            "using \"templated details\""
        );
        assert_eq!(render("{{ .a | upper | quote }}", &[("a", "x")]), "\"X\"");
        assert_eq!(render("{{quote .a}}", &[("a", "x")]), "\"x\"");
    }

    #[test]
    fn string_operands() {
        assert_eq!(render(r#"{{"lit" | upper}}"#, &[]), "LIT");
        assert_eq!(render("{{`raw \\n`}}", &[]), "raw \\n");
        assert_eq!(render(r#"{{"a\"b"}}"#, &[]), "a\"b");
    }

    #[test]
    fn undefined_variables_render_no_value() {
        assert_eq!(render("using {{.undefined}}", &[("tmpl", "x")]), "using <no value>");
    }

    #[test]
    fn missing_key_modes() {
        let scope = Scope::from_pairs(&[]);
        let t = Template::parse("[{{.nope}}]", &Transforms::default()).unwrap();
        assert_eq!(t.render(&scope, MissingKey::Default).unwrap(), "[<no value>]");
        assert_eq!(t.render(&scope, MissingKey::Zero).unwrap(), "[]");
        let err = t.render(&scope, MissingKey::Error).unwrap_err();
        assert_eq!(
            err.to_string(),
            "template: :1:3: executing \"\" at <.nope>: map has no entry for key \"nope\""
        );
    }

    #[test]
    fn unknown_function_is_a_parse_error() {
        assert_eq!(
            render("using {{func}}", &[]),
            "[[template: :1: function \"func\" not defined]]"
        );
        assert_eq!(
            render("{{.a | nope}}", &[("a", "x")]),
            "[[template: :1: function \"nope\" not defined]]"
        );
    }

    #[test]
    fn malformed_actions() {
        assert_eq!(render("a {{.b", &[]), "[[template: :1: unclosed action]]");
        assert_eq!(render("{{}}", &[]), "[[template: :1: missing value for command]]");
        assert_eq!(render("{{| quote}}", &[]), "[[template: :1: missing value for command]]");
        assert_eq!(
            render("x\n{{\"open}}", &[]),
            "[[template: :2: unterminated quoted string]]"
        );
        assert_eq!(
            render("{{.a .b}}", &[]),
            "[[template: :1: can't give argument to non-function .a]]"
        );
        assert_eq!(
            render("{{.a | .b}}", &[]),
            "[[template: :1: can't give argument to non-function .b]]"
        );
        assert_eq!(
            render("{{.a!}}", &[]),
            "[[template: :1: unrecognized character in action: U+0021 '!']]"
        );
    }

    #[test]
    fn transform_on_missing_value_fails_execution() {
        assert_eq!(
            render("{{.nope | quote}}", &[]),
            "[[template: :1:10: executing \"\" at <quote>: invalid value; expected string]]"
        );
    }

    #[test]
    fn wrong_arity_fails_execution() {
        assert_eq!(
            render("{{quote .a .b}}", &[("a", "1"), ("b", "2")]),
            "[[template: :1:2: executing \"\" at <quote>: \
             wrong number of args for quote: want 1 got 2]]"
        );
    }

    #[test]
    fn dot_prints_scope() {
        assert_eq!(render("{{.}}", &[("b", "2"), ("a", "1")]), "map[a:1 b:2]");
    }

    #[test]
    fn comments_and_trim_markers() {
        assert_eq!(render("a {{/* hidden */}}b", &[]), "a b");
        assert_eq!(render("a  {{- .x -}}  b", &[("x", "X")]), "aXb");
        assert_eq!(render("a {{- /* c */ -}} b", &[]), "ab");
        assert_eq!(render("a {{/* open", &[]), "[[template: :1: unclosed comment]]");
    }

    #[test]
    fn custom_transforms() {
        let transforms = Transforms::default()
            .with("join", Transform::new(2, |args| args.join("+")))
            .with("quote", Transform::unary(|s| format!("'{s}'")));
        let scope = Scope::from_pairs(&[("a", "x")]);
        let out = render_or_placeholder(
            "{{join \"p\" .a}} {{.a | quote}}",
            &scope,
            &transforms,
            MissingKey::Default,
        );
        assert_eq!(out, "p+x 'x'");
        assert!(transforms.names().any(|n| n == "join"));
    }

    #[test]
    fn quote_escapes_like_go() {
        assert_eq!(quote("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(quote("\u{1}"), "\"\\x01\"");
        assert_eq!(quote("héllo"), "\"héllo\"");
    }

    #[test]
    fn multiline_error_lines() {
        let err = Template::parse("one\ntwo {{nope}}", &Transforms::default()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Parse {
                line: 2,
                message: "function \"nope\" not defined".to_owned()
            }
        );
    }
}
