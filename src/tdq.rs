//! Evaluator for the TDQ query language used by boards and the search bar.
//!
//! Grammar (informal):
//!
//! ```text
//! query   := (expr)? (sort:[-]field)?
//! expr    := and (OR and)*
//! and     := unary ((AND)? unary)*
//! unary   := NOT unary | primary
//! primary := '(' expr ')' | func '(' args ')' | field op value | word
//! ```
//!
//! Bare words match the issue title or id as a case-insensitive substring.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::issue::{Issue, IssueType, Priority, Status};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of query")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Contains,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Op {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Op::Eq),
            "!=" => Some(Op::Ne),
            "~" => Some(Op::Contains),
            "<" => Some(Op::Lt),
            ">" => Some(Op::Gt),
            "<=" => Some(Op::Le),
            ">=" => Some(Op::Ge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Title,
    Description,
    Status,
    Type,
    Priority,
    Labels,
    Points,
    Parent,
    Implementer,
    Reviewer,
    Created,
    Updated,
}

impl Field {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Some(Field::Id),
            "title" => Some(Field::Title),
            "description" | "desc" => Some(Field::Description),
            "status" => Some(Field::Status),
            "type" => Some(Field::Type),
            "priority" | "pri" => Some(Field::Priority),
            "labels" | "label" => Some(Field::Labels),
            "points" => Some(Field::Points),
            "parent" => Some(Field::Parent),
            "implementer" => Some(Field::Implementer),
            "reviewer" => Some(Field::Reviewer),
            "created" => Some(Field::Created),
            "updated" => Some(Field::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Priority,
    Created,
    Updated,
    Id,
    Title,
    Points,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "priority" => Some(SortField::Priority),
            "created" => Some(SortField::Created),
            "updated" => Some(SortField::Updated),
            "id" => Some(SortField::Id),
            "title" => Some(SortField::Title),
            "points" => Some(SortField::Points),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp { field: Field, op: Op, value: String },
    Has(Field),
    Is(Status),
    Any(Field, Vec<String>),
    DescendantOf(String),
    Text(String),
}

/// Values that depend on who is asking and when.
pub struct EvalContext<'a> {
    pub session_id: &'a str,
    pub now: DateTime<Utc>,
    /// issue id -> parent id, for `descendant_of`.
    pub parents: HashMap<&'a str, &'a str>,
}

impl<'a> EvalContext<'a> {
    pub fn new(session_id: &'a str, issues: &'a [Issue]) -> Self {
        let parents = issues
            .iter()
            .filter_map(|i| i.parent_id.as_deref().map(|p| (i.id.as_str(), p)))
            .collect();
        Self {
            session_id,
            now: Utc::now(),
            parents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    expr: Option<Expr>,
    pub sort: Option<SortSpec>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.expr.is_none() && self.sort.is_none()
    }

    pub fn matches(&self, issue: &Issue, ctx: &EvalContext<'_>) -> bool {
        match &self.expr {
            Some(e) => eval(e, issue, ctx),
            None => true,
        }
    }

    /// Sort by the query's `sort:` token, or leave the order untouched.
    pub fn sort(&self, issues: &mut [Issue]) {
        if let Some(spec) = self.sort {
            sort_issues(issues, spec);
        }
    }
}

pub fn sort_issues(issues: &mut [Issue], spec: SortSpec) {
    issues.sort_by(|a, b| {
        let ord = match spec.field {
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
            SortField::Id => a.id.cmp(&b.id),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Points => a.points.cmp(&b.points),
        };
        if spec.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Op(Op),
    Word(String),
    Str(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .map(|p| start + p)
                    .ok_or(ParseError::UnterminatedString)?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '=' | '~' => {
                tokens.push(Token::Op(if c == '=' { Op::Eq } else { Op::Contains }));
                i += 1;
            }
            '!' | '<' | '>' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                if let Some(op) = Op::parse(&two) {
                    tokens.push(Token::Op(op));
                    i += 2;
                } else if let Some(op) = Op::parse(&c.to_string()) {
                    tokens.push(Token::Op(op));
                    i += 1;
                } else {
                    return Err(ParseError::UnexpectedToken(c.to_string()));
                }
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], '(' | ')' | ',' | '=' | '~' | '!' | '<' | '>' | '"')
                {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            if self.is_keyword("and") {
                self.pos += 1;
            } else if self.peek().is_none()
                || self.is_keyword("or")
                || matches!(self.peek(), Some(Token::RParen))
            {
                break;
            }
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.is_keyword("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            None => Err(ParseError::UnexpectedEnd),
            Some(Token::LParen) => {
                let e = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(e),
                    Some(t) => Err(ParseError::UnexpectedToken(token_text(&t))),
                    None => Err(ParseError::UnexpectedEnd),
                }
            }
            Some(Token::Str(s)) => Ok(Expr::Text(s)),
            Some(Token::Word(w)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    return self.parse_function(&w);
                }
                if let Some(Token::Op(op)) = self.peek().cloned() {
                    self.pos += 1;
                    let field = Field::parse(&w).ok_or_else(|| ParseError::UnknownField(w.clone()))?;
                    let value = self.parse_value()?;
                    return Ok(Expr::Cmp { field, op, value });
                }
                Ok(Expr::Text(w))
            }
            Some(t) => Err(ParseError::UnexpectedToken(token_text(&t))),
        }
    }

    fn parse_value(&mut self) -> Result<String, ParseError> {
        match self.next() {
            Some(Token::Word(w)) | Some(Token::Str(w)) => Ok(w),
            Some(t) => Err(ParseError::UnexpectedToken(token_text(&t))),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<String>, ParseError> {
        let mut args = Vec::new();
        loop {
            match self.next() {
                Some(Token::RParen) => break,
                Some(Token::Comma) => continue,
                Some(Token::Word(w)) | Some(Token::Str(w)) => args.push(w),
                Some(t) => return Err(ParseError::UnexpectedToken(token_text(&t))),
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
        Ok(args)
    }

    fn parse_function(&mut self, name: &str) -> Result<Expr, ParseError> {
        let args = self.parse_args()?;
        let first = || args.first().cloned().ok_or(ParseError::UnexpectedEnd);
        match name.to_ascii_lowercase().as_str() {
            "has" => {
                let f = first()?;
                Ok(Expr::Has(Field::parse(&f).ok_or(ParseError::UnknownField(f))?))
            }
            "is" => {
                let s = first()?;
                let status = Status::parse(&s).ok_or(ParseError::InvalidValue {
                    field: "status".to_string(),
                    value: s,
                })?;
                Ok(Expr::Is(status))
            }
            "any" => {
                let f = first()?;
                let field = Field::parse(&f).ok_or(ParseError::UnknownField(f))?;
                Ok(Expr::Any(field, args[1..].to_vec()))
            }
            "descendant_of" => Ok(Expr::DescendantOf(first()?)),
            _ => Err(ParseError::UnknownFunction(name.to_string())),
        }
    }
}

fn token_text(t: &Token) -> String {
    match t {
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
        Token::Comma => ",".to_string(),
        Token::Op(op) => format!("{:?}", op),
        Token::Word(w) | Token::Str(w) => w.clone(),
    }
}

/// Parse a TDQ string. An empty string yields a query that matches everything.
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let mut sort = None;
    let mut rest = Vec::new();
    for tok in tokenize(input)? {
        match &tok {
            Token::Word(w) if w.to_ascii_lowercase().starts_with("sort:") => {
                let spec = &w[5..];
                let (descending, name) = match spec.strip_prefix('-') {
                    Some(n) => (true, n),
                    None => (false, spec),
                };
                let field = SortField::parse(name).ok_or_else(|| ParseError::InvalidValue {
                    field: "sort".to_string(),
                    value: name.to_string(),
                })?;
                sort = Some(SortSpec { field, descending });
            }
            _ => rest.push(tok),
        }
    }

    if rest.is_empty() {
        return Ok(Query { expr: None, sort });
    }
    let mut parser = Parser { tokens: rest, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(t) = parser.peek_at(0) {
        return Err(ParseError::UnexpectedToken(token_text(t)));
    }
    Ok(Query {
        expr: Some(expr),
        sort,
    })
}

fn eval(expr: &Expr, issue: &Issue, ctx: &EvalContext<'_>) -> bool {
    match expr {
        Expr::And(a, b) => eval(a, issue, ctx) && eval(b, issue, ctx),
        Expr::Or(a, b) => eval(a, issue, ctx) || eval(b, issue, ctx),
        Expr::Not(e) => !eval(e, issue, ctx),
        Expr::Text(t) => {
            let needle = t.to_lowercase();
            issue.title.to_lowercase().contains(&needle) || issue.id.to_lowercase().contains(&needle)
        }
        Expr::Is(s) => issue.status == *s,
        Expr::Has(f) => field_values(issue, *f).iter().any(|v| !v.is_empty()),
        Expr::Any(f, values) => {
            let actual = field_values(issue, *f);
            values.iter().any(|v| {
                let v = resolve_value(v, ctx);
                actual.iter().any(|a| a.eq_ignore_ascii_case(&v))
            })
        }
        Expr::DescendantOf(root) => {
            let mut cur = issue.parent_id.as_deref();
            let mut hops = 0;
            while let Some(p) = cur {
                if p == root {
                    return true;
                }
                hops += 1;
                if hops > 64 {
                    break;
                }
                cur = ctx.parents.get(p).copied();
            }
            false
        }
        Expr::Cmp { field, op, value } => compare(issue, *field, *op, value, ctx),
    }
}

fn resolve_value(value: &str, ctx: &EvalContext<'_>) -> String {
    match value {
        "@me" => ctx.session_id.to_string(),
        "EMPTY" => String::new(),
        v => v.to_string(),
    }
}

fn field_values(issue: &Issue, field: Field) -> Vec<String> {
    match field {
        Field::Id => vec![issue.id.clone()],
        Field::Title => vec![issue.title.clone()],
        Field::Description => vec![issue.description.clone()],
        Field::Status => vec![issue.status.as_str().to_string()],
        Field::Type => vec![issue.issue_type.as_str().to_string()],
        Field::Priority => vec![issue.priority.as_str().to_string()],
        Field::Labels => issue.labels.clone(),
        Field::Points => vec![if issue.points == 0 {
            String::new()
        } else {
            issue.points.to_string()
        }],
        Field::Parent => vec![issue.parent_id.clone().unwrap_or_default()],
        Field::Implementer => vec![issue.implementer_session.clone().unwrap_or_default()],
        Field::Reviewer => vec![issue.reviewer_session.clone().unwrap_or_default()],
        Field::Created => vec![issue.created_at.to_rfc3339()],
        Field::Updated => vec![issue.updated_at.to_rfc3339()],
    }
}

/// `today`, `-7d`, or `YYYY-MM-DD`.
fn parse_date(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if value.eq_ignore_ascii_case("today") {
        return now.date_naive().and_hms_opt(0, 0, 0).map(|d| d.and_utc());
    }
    if let Some(days) = value.strip_prefix('-').and_then(|v| v.strip_suffix('d')) {
        let n: i64 = days.parse().ok()?;
        return Some(now - Duration::days(n));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

fn ordered<T: PartialOrd>(a: T, op: Op, b: T) -> bool {
    match op {
        Op::Eq => a == b,
        Op::Ne => a != b,
        Op::Lt => a < b,
        Op::Gt => a > b,
        Op::Le => a <= b,
        Op::Ge => a >= b,
        Op::Contains => false,
    }
}

fn compare(issue: &Issue, field: Field, op: Op, value: &str, ctx: &EvalContext<'_>) -> bool {
    let value = resolve_value(value, ctx);
    match field {
        Field::Priority if op != Op::Contains => match Priority::parse(&value) {
            Some(p) => ordered(issue.priority.rank(), op, p.rank()),
            None => false,
        },
        Field::Points if op != Op::Contains && !value.is_empty() => match value.parse::<u32>() {
            Ok(n) => ordered(issue.points, op, n),
            Err(_) => false,
        },
        Field::Created | Field::Updated if op != Op::Contains => {
            let actual = if field == Field::Created {
                issue.created_at
            } else {
                issue.updated_at
            };
            match parse_date(&value, ctx.now) {
                Some(d) => ordered(actual, op, d),
                None => false,
            }
        }
        Field::Status if op == Op::Eq || op == Op::Ne => {
            let matches = Status::parse(&value) == Some(issue.status);
            if op == Op::Eq {
                matches
            } else {
                !matches
            }
        }
        Field::Type if op == Op::Eq || op == Op::Ne => {
            let matches = IssueType::parse(&value) == Some(issue.issue_type);
            if op == Op::Eq {
                matches
            } else {
                !matches
            }
        }
        _ => {
            let values = field_values(issue, field);
            let needle = value.to_lowercase();
            match op {
                Op::Eq => values.iter().any(|v| v.eq_ignore_ascii_case(&value)),
                Op::Ne => !values.iter().any(|v| v.eq_ignore_ascii_case(&value)),
                Op::Contains => values.iter().any(|v| v.to_lowercase().contains(&needle)),
                _ => values.iter().any(|v| ordered(v.as_str(), op, value.as_str())),
            }
        }
    }
}

/// Rewrite (or drop) the `sort:` token of a query string.
pub fn set_sort_token(query: &str, sort: Option<&str>) -> String {
    let mut parts: Vec<&str> = query
        .split_whitespace()
        .filter(|w| !w.to_ascii_lowercase().starts_with("sort:"))
        .collect();
    let token = sort.map(|s| format!("sort:{}", s));
    if let Some(t) = token.as_deref() {
        parts.push(t);
    }
    parts.join(" ")
}

/// Rewrite (or drop) a `type = X` clause of a query string.
pub fn set_type_token(query: &str, issue_type: Option<IssueType>) -> String {
    let words: Vec<&str> = query.split_whitespace().collect();
    let mut kept: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let w = words[i];
        if w.eq_ignore_ascii_case("type") && words.get(i + 1) == Some(&"=") && i + 2 < words.len() {
            i += 3;
            if kept.last().is_some_and(|k| k.eq_ignore_ascii_case("and")) {
                kept.pop();
            } else if words.get(i).is_some_and(|n| n.eq_ignore_ascii_case("and")) {
                i += 1;
            }
            continue;
        }
        if let Some(rest) = w.to_ascii_lowercase().strip_prefix("type=") {
            if !rest.is_empty() {
                i += 1;
                continue;
            }
        }
        kept.push(w);
        i += 1;
    }

    let (mut body, sort): (Vec<&str>, Vec<&str>) = kept
        .into_iter()
        .partition(|w| !w.to_ascii_lowercase().starts_with("sort:"));
    let clause = issue_type.map(|t| format!("type = {}", t.as_str()));
    if let Some(c) = clause.as_deref() {
        if !body.is_empty() {
            body.push("AND");
        }
        body.push(c);
    }
    body.extend(sort);
    body.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: &str, title: &str, status: Status, pri: Priority) -> Issue {
        let mut i = Issue::new(id, title);
        i.status = status;
        i.priority = pri;
        i
    }

    fn matches(q: &str, i: &Issue) -> bool {
        let all = vec![i.clone()];
        let ctx = EvalContext::new("ses_me", &all);
        parse(q).unwrap().matches(i, &ctx)
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = parse("").unwrap();
        assert!(q.is_empty());
        assert!(matches("", &issue("td-1", "x", Status::Open, Priority::P2)));
    }

    #[test]
    fn comparisons_and_boolean_logic() {
        let i = issue("td-1", "Fix cache", Status::Open, Priority::P1);
        assert!(matches("status = open", &i));
        assert!(!matches("status != open", &i));
        assert!(matches("priority <= P1 AND title ~ cache", &i));
        assert!(matches("status = closed OR priority = P1", &i));
        assert!(!matches("NOT (status = open)", &i));
        assert!(matches("is(open) cache", &i));
    }

    #[test]
    fn functions_and_sugars() {
        let mut i = issue("td-2", "Epic child", Status::InProgress, Priority::P2);
        i.parent_id = Some("td-epic".to_string());
        i.implementer_session = Some("ses_me".to_string());
        assert!(matches("has(parent)", &i));
        assert!(!matches("has(labels)", &i));
        assert!(matches("any(status, open, in_progress)", &i));
        assert!(matches("descendant_of(td-epic)", &i));
        assert!(matches("implementer = @me", &i));
        assert!(matches("reviewer = EMPTY", &i));
        assert!(matches("created >= -7d", &i));
    }

    #[test]
    fn sort_token_is_extracted() {
        let q = parse("status = open sort:-priority").unwrap();
        assert_eq!(
            q.sort,
            Some(SortSpec {
                field: SortField::Priority,
                descending: true
            })
        );
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(matches!(parse("bogus = 1"), Err(ParseError::UnknownField(_))));
        assert!(matches!(parse("(status = open"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("nope(x)"), Err(ParseError::UnknownFunction(_))));
        assert!(matches!(parse("title = \"abc"), Err(ParseError::UnterminatedString)));
    }

    #[test]
    fn rewrite_sort_and_type_tokens() {
        assert_eq!(set_sort_token("cache sort:id", Some("-priority")), "cache sort:-priority");
        assert_eq!(set_sort_token("cache sort:id", None), "cache");
        assert_eq!(
            set_type_token("cache", Some(IssueType::Bug)),
            "cache AND type = bug"
        );
        assert_eq!(
            set_type_token("cache AND type = bug sort:id", Some(IssueType::Epic)),
            "cache AND type = epic sort:id"
        );
        assert_eq!(set_type_token("type = bug", None), "");
    }
}
