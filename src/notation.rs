//! Rule notation reader.
//!
//! A compact, line-oriented way to write rule sets for fixtures and the
//! command line. It covers exactly what a [`Rule`] can hold and nothing more:
//! no variables, no named properties, no quoting.
//!
//! ```text
//! # comment
//! psch > Y ;                 key > output
//! ab > x|yzacw ;             '|' places the cursor inside the output
//! x { a } b > q ;            ante { key } post
//! [aeiou] } [A-Z] > ! ;      a '}' alone ends the key; ante is empty
//! ^ a > b ;  z $ > y ;       anchors at the context start / limit
//! [^a-z0-9] > * ;            classes: ranges, members, leading '^' negates
//! \{ \u{3B1} > \> ;          escapes: \x for a literal, \u{HEX} by code point
//! ```
//!
//! Statements end at `;` or a newline. Whitespace outside classes is
//! insignificant, so a literal space must be written `\u{20}`. This is the
//! same notation `Display for Rule` produces.

use crate::{CharClass, NotationError, Rule, SymbolMatcher};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Symbol(SymbolMatcher),
    Open,
    Close,
    Arrow,
    Cursor,
    Caret,
    Dollar,
}

/// Parse every statement in `source` into rules, in order.
pub fn parse_rules(source: &str) -> Result<Vec<Rule>, NotationError> {
    let lexer = regex!(
        r"(?s)(?P<comment>#[^\n]*)|\\u\{(?P<hex>[0-9A-Fa-f]{1,6})\}|\\(?P<esc>.)|\[(?P<class>(?:\\.|[^\]\\])*)\]|(?P<ws>[ \t\r\f]+)|(?P<ch>.)"
    );

    let mut rules = Vec::new();
    let mut statement: Vec<Token> = Vec::new();
    let mut line = 1;
    let mut statement_line = 1;

    for caps in lexer.captures_iter(source) {
        let token = if caps.name("comment").is_some() || caps.name("ws").is_some() {
            continue;
        } else if let Some(hex) = caps.name("hex") {
            Token::Symbol(SymbolMatcher::Literal(from_hex(hex.as_str(), line)?))
        } else if let Some(esc) = caps.name("esc") {
            let c = esc.as_str().chars().next().unwrap_or('\\');
            if c == '\n' {
                line += 1;
            }
            Token::Symbol(SymbolMatcher::Literal(c))
        } else if let Some(body) = caps.name("class") {
            Token::Symbol(SymbolMatcher::Class(parse_class(body.as_str(), line)?))
        } else {
            match caps.name("ch").map(|m| m.as_str()).unwrap_or_default() {
                ";" | "\n" => {
                    if !statement.is_empty() {
                        rules.push(parse_statement(&statement, statement_line)?);
                        statement.clear();
                    }
                    if caps.name("ch").is_some_and(|m| m.as_str() == "\n") {
                        line += 1;
                    }
                    continue;
                }
                "{" => Token::Open,
                "}" => Token::Close,
                ">" => Token::Arrow,
                "|" => Token::Cursor,
                "^" => Token::Caret,
                "$" => Token::Dollar,
                "[" => return Err(NotationError::syntax(line, "unterminated character class")),
                other => Token::Symbol(SymbolMatcher::Literal(other.chars().next().unwrap_or_default())),
            }
        };

        if statement.is_empty() {
            statement_line = line;
        }
        statement.push(token);
    }

    if !statement.is_empty() {
        rules.push(parse_statement(&statement, statement_line)?);
    }

    Ok(rules)
}

fn from_hex(hex: &str, line: usize) -> Result<char, NotationError> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| NotationError::syntax(line, format!("\\u{{{hex}}} is not a Unicode scalar value")))
}

/// One class member or range, possibly escaped.
fn class_char(token: &str, line: usize) -> Result<char, NotationError> {
    if let Some(hex) = token.strip_prefix("\\u{").and_then(|t| t.strip_suffix('}')) {
        return from_hex(hex, line);
    }
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some('\\'), Some(c)) => Ok(c),
        (Some(c), None) => Ok(c),
        _ => Err(NotationError::syntax(line, format!("bad class member {token:?}"))),
    }
}

fn parse_class(body: &str, line: usize) -> Result<CharClass, NotationError> {
    let items = regex!(r"(?s)(?P<lo>\\u\{[0-9A-Fa-f]{1,6}\}|\\.|[^\\])(?:-(?P<hi>\\u\{[0-9A-Fa-f]{1,6}\}|\\.|[^\\]))?");

    let name = format!("[{body}]");
    let (negated, members) = match body.strip_prefix('^') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    let mut ranges = Vec::new();
    for caps in items.captures_iter(members) {
        let Some(lo) = caps.name("lo") else { continue };
        if lo.as_str().chars().all(char::is_whitespace) && caps.name("hi").is_none() {
            continue;
        }
        let lo = class_char(lo.as_str(), line)?;
        let hi = match caps.name("hi") {
            Some(hi) => class_char(hi.as_str(), line)?,
            None => lo,
        };
        if hi < lo {
            return Err(NotationError::syntax(line, format!("reversed range {lo}-{hi} in {name}")));
        }
        ranges.push(lo..=hi);
    }

    let class = CharClass::new(name.clone(), ranges);
    Ok(if negated { class.complement(name) } else { class })
}

fn parse_statement(tokens: &[Token], line: usize) -> Result<Rule, NotationError> {
    let arrow = tokens
        .iter()
        .position(|t| *t == Token::Arrow)
        .ok_or_else(|| NotationError::syntax(line, "missing '>'"))?;
    let (mut lhs, rhs) = (&tokens[..arrow], &tokens[arrow + 1..]);

    let mut builder = Rule::builder();
    if let [Token::Caret, rest @ ..] = lhs {
        builder = builder.anchor_start();
        lhs = rest;
    }
    if let [rest @ .., Token::Dollar] = lhs {
        builder = builder.anchor_end();
        lhs = rest;
    }

    let open = lhs.iter().position(|t| *t == Token::Open);
    let close = lhs.iter().position(|t| *t == Token::Close);
    let empty: &[Token] = &[];
    let (ante, key, post) = match (open, close) {
        (Some(o), Some(c)) if o < c => (&lhs[..o], &lhs[o + 1..c], &lhs[c + 1..]),
        (Some(o), None) => (&lhs[..o], &lhs[o + 1..], empty),
        (None, Some(c)) => (empty, &lhs[..c], &lhs[c + 1..]),
        (None, None) => (empty, lhs, empty),
        _ => return Err(NotationError::syntax(line, "'}' before '{'")),
    };

    let mut output = String::new();
    let mut cursor = None;
    for token in rhs {
        match token {
            Token::Symbol(SymbolMatcher::Literal(c)) => output.push(*c),
            Token::Cursor if cursor.is_none() => cursor = Some(output.chars().count()),
            Token::Cursor => return Err(NotationError::syntax(line, "more than one '|' in output")),
            Token::Symbol(SymbolMatcher::Class(_)) => {
                return Err(NotationError::syntax(line, "character classes cannot appear in output"));
            }
            other => return Err(NotationError::syntax(line, format!("unexpected {} in output", describe(other)))),
        }
    }

    builder = builder.ante(symbols(ante, line)?).key(symbols(key, line)?).post(symbols(post, line)?).output(&output);
    if let Some(cursor) = cursor {
        builder = builder.cursor(cursor);
    }
    builder.build().map_err(|source| NotationError::Rule { line, source })
}

fn symbols(tokens: &[Token], line: usize) -> Result<Vec<SymbolMatcher>, NotationError> {
    tokens
        .iter()
        .map(|t| match t {
            Token::Symbol(m) => Ok(m.clone()),
            other => Err(NotationError::syntax(line, format!("unexpected {} in pattern", describe(other)))),
        })
        .collect()
}

fn describe(token: &Token) -> &'static str {
    match token {
        Token::Symbol(_) => "symbol",
        Token::Open => "'{'",
        Token::Close => "'}'",
        Token::Arrow => "'>'",
        Token::Cursor => "'|'",
        Token::Caret => "'^'",
        Token::Dollar => "'$'",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RuleDefect, RuleError, RuleFlags};

    #[test]
    fn parses_cursor_marker() {
        let rules = parse_rules("ab>x|yzacw; za>q").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].output().iter().collect::<String>(), "xyzacw");
        assert_eq!(rules[0].cursor_offset(), 1);
        assert_eq!(rules[1].cursor_offset(), 1);
    }

    #[test]
    fn parses_context_and_anchors() {
        let rules = parse_rules("^ x { a } b $ > q\n[aeiou] } [A-Z] > !").unwrap();
        assert_eq!(rules[0].ante(), &[SymbolMatcher::Literal('x')]);
        assert_eq!(rules[0].key(), &[SymbolMatcher::Literal('a')]);
        assert_eq!(rules[0].post(), &[SymbolMatcher::Literal('b')]);
        assert_eq!(rules[0].flags(), RuleFlags::ANCHOR_START | RuleFlags::ANCHOR_END);

        assert!(rules[1].ante().is_empty());
        assert!(matches!(&rules[1].key()[0], SymbolMatcher::Class(c) if c.contains('e') && !c.contains('b')));
        assert!(matches!(&rules[1].post()[0], SymbolMatcher::Class(c) if c.contains('Q')));
    }

    #[test]
    fn parses_classes_escapes_and_comments() {
        let source = "# digits\n[^a-z0-9] > * ; # tail comment\n\\{ \\u{3B1} > \\> ;\n[a\\-] > m";
        let rules = parse_rules(source).unwrap();
        assert_eq!(rules.len(), 3);

        let SymbolMatcher::Class(special) = &rules[0].key()[0] else { panic!("expected class") };
        assert!(special.contains('-'));
        assert!(!special.contains('q'));
        assert!(!special.contains('5'));

        assert_eq!(rules[1].key(), &[SymbolMatcher::Literal('{'), SymbolMatcher::Literal('α')]);
        assert_eq!(rules[1].output(), &['>']);

        let SymbolMatcher::Class(dash) = &rules[2].key()[0] else { panic!("expected class") };
        assert!(dash.contains('-'));
        assert!(dash.contains('a'));
        assert!(!dash.contains('b'));
    }

    #[test]
    fn reports_syntax_errors_with_line() {
        assert_eq!(parse_rules("a > b\nab").unwrap_err(), NotationError::syntax(2, "missing '>'"));
        assert!(matches!(parse_rules("a > [xy]"), Err(NotationError::Syntax { line: 1, .. })));
        assert!(matches!(parse_rules("a > x|y|z"), Err(NotationError::Syntax { .. })));
        assert!(matches!(parse_rules("a | b > c"), Err(NotationError::Syntax { .. })));
        assert!(matches!(parse_rules("a } b { c > d"), Err(NotationError::Syntax { .. })));
        assert!(matches!(parse_rules("[z-a] > d"), Err(NotationError::Syntax { .. })));
        assert!(matches!(parse_rules("[ab > d"), Err(NotationError::Syntax { .. })));
        assert!(matches!(parse_rules("\\u{D800} > d"), Err(NotationError::Syntax { .. })));
    }

    #[test]
    fn empty_key_surfaces_as_rule_error() {
        let err = parse_rules("\n\nx { } > y").unwrap_err();
        assert_eq!(err, NotationError::Rule { line: 3, source: RuleError::InvalidRule(RuleDefect::EmptyKey) });
    }

    #[test]
    fn display_output_parses_back_to_the_same_rules() {
        let source = "^ x { a } [b-d] > p|q ; [^a-z] > \\u{20} ; \\; \\| > \\$ ; z $ > |y";
        let rules = parse_rules(source).unwrap();
        let rendered = rules.iter().map(|r| r.to_string()).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_rules(&rendered).unwrap(), rules);
    }

    #[test]
    fn complement_next_to_surrogates_renders_readably() {
        let low = CharClass::new("private", ['\u{E000}'..='\u{10FFFF}']).complement("low");
        let rule = Rule::new("", low, "", "x", None).unwrap();
        let rendered = rule.to_string();
        assert_eq!(rendered, "[\\u{0}-\u{D7FF}] > x ;");
        assert_eq!(parse_rules(&rendered).unwrap(), vec![rule]);
    }
}
