// src/expression.rs
use crate::context::Context;
use crate::document::{DocPath, PathSegment};
use crate::errors::{Result, VerifyError};
use crate::evaluator::Evaluator;
use crate::functions::Evaluated;
use crate::parser::Parser;
use serde_json::Value;

/// Commands separated by `|`; each result becomes the last argument of the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Call { name: String, args: Vec<Operand> },
    Operand(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    Path(DocPath),
    Sub(Box<Pipeline>),
}

/// Parse the inside of one `{{ ... }}` action. `base` is its offset in the template.
pub fn parse_action(input: &str, base: usize) -> Result<Pipeline> {
    let mut p = Parser::with_base(input, base);
    let pipeline = parse_pipeline(&mut p)?;
    p.skip_ws();
    if !p.eof() {
        return Err(p.error("trailing input"));
    }
    Ok(pipeline)
}

fn parse_pipeline(p: &mut Parser) -> Result<Pipeline> {
    let mut commands = vec![parse_command(p)?];
    loop {
        p.skip_ws();
        if !p.consume_char('|') {
            break;
        }
        let cmd = parse_command(p)?;
        if matches!(cmd, Command::Operand(_)) {
            return Err(p.error("cannot pipe a value into a non-function"));
        }
        commands.push(cmd);
    }
    Ok(Pipeline { commands })
}

fn at_command_end(p: &Parser) -> bool {
    p.eof() || p.peek_char() == Some('|') || p.peek_char() == Some(')')
}

fn parse_command(p: &mut Parser) -> Result<Command> {
    p.skip_ws();
    if at_command_end(p) {
        return Err(p.error("missing value for command"));
    }
    let starts_name = p
        .peek_char()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic());
    if starts_name && !is_keyword_ahead(p) {
        let name = p.parse_identifier()?;
        let mut args = Vec::new();
        loop {
            p.skip_ws();
            if at_command_end(p) {
                break;
            }
            args.push(parse_operand(p)?);
        }
        return Ok(Command::Call { name, args });
    }
    let operand = parse_operand(p)?;
    p.skip_ws();
    if !at_command_end(p) {
        return Err(p.error("unexpected operand after value"));
    }
    Ok(Command::Operand(operand))
}

fn is_keyword_ahead(p: &Parser) -> bool {
    ["nil", "true", "false"].iter().any(|kw| {
        p.peek_str(kw)
            && !p
                .peek_nth(kw.len())
                .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric())
    })
}

fn parse_operand(p: &mut Parser) -> Result<Operand> {
    p.skip_ws();
    if p.consume_keyword("nil") {
        return Ok(Operand::Nil);
    }
    if p.consume_keyword("true") {
        return Ok(Operand::Bool(true));
    }
    if p.consume_keyword("false") {
        return Ok(Operand::Bool(false));
    }
    match p.peek_char() {
        Some('"') | Some('\'') | Some('`') => Ok(Operand::Str(p.parse_quoted_string()?)),
        Some('(') => {
            p.consume_char('(');
            let inner = parse_pipeline(p)?;
            p.skip_ws();
            p.expect(')')?;
            Ok(Operand::Sub(Box::new(inner)))
        }
        Some('.') => Ok(Operand::Path(parse_path(p)?)),
        Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => Ok(Operand::Int(p.parse_int()?)),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            Err(p.error("function call needs parentheses when used as an argument"))
        }
        _ => Err(p.error("invalid operand")),
    }
}

/// `.`, `.a.b`, `.items[0].id`, `.labels["a.b"]`. A leading `.actual` is the root.
fn parse_path(p: &mut Parser) -> Result<DocPath> {
    let mut path = DocPath::root();
    let mut first = true;
    loop {
        if p.consume_char('.') {
            let named = p
                .peek_char()
                .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric());
            if named {
                let key = p.parse_identifier()?;
                if !(first && key == "actual") {
                    path.push(PathSegment::Key(key));
                }
            } else if !first && p.peek_char() != Some('[') {
                return Err(p.error("field name expected after '.'"));
            }
        } else if p.consume_char('[') {
            p.skip_ws();
            if matches!(p.peek_char(), Some('"') | Some('\'')) {
                path.push(PathSegment::Key(p.parse_quoted_string()?));
            } else {
                let at = p.offset();
                let i = p.parse_int()?;
                let i = usize::try_from(i).map_err(|_| VerifyError::syntax(at, "negative index"))?;
                path.push(PathSegment::Index(i));
            }
            p.skip_ws();
            p.expect(']')?;
        } else {
            break;
        }
        first = false;
    }
    Ok(path)
}

impl Pipeline {
    pub fn eval(&self, ev: &Evaluator<'_>, ctx: &Context<'_>) -> Result<Evaluated> {
        let mut piped: Option<Evaluated> = None;
        for cmd in &self.commands {
            let result = match cmd {
                Command::Operand(op) => op.eval(ev, ctx)?,
                Command::Call { name, args } => {
                    let mut values = args
                        .iter()
                        .map(|a| a.eval(ev, ctx))
                        .collect::<Result<Vec<_>>>()?;
                    values.extend(piped.take());
                    ev.invoke(name, values)?
                }
            };
            piped = Some(result);
        }
        Ok(piped.unwrap_or(Evaluated::Value(Value::Null)))
    }
}

impl Operand {
    fn eval(&self, ev: &Evaluator<'_>, ctx: &Context<'_>) -> Result<Evaluated> {
        Ok(match self {
            Operand::Str(s) => Evaluated::text(s.as_str()),
            Operand::Int(i) => Evaluated::Value(Value::from(*i)),
            Operand::Bool(b) => Evaluated::Value(Value::Bool(*b)),
            Operand::Nil => Evaluated::Value(Value::Null),
            Operand::Path(path) => {
                Evaluated::Value(ctx.lookup(path).cloned().unwrap_or(Value::Null))
            }
            Operand::Sub(inner) => inner.eval(ev, ctx)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Registry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eval(action: &str, actual: &Value) -> Result<Evaluated> {
        let registry = Registry::with_builtins();
        let ev = Evaluator::new(&registry);
        parse_action(action, 0)?.eval(&ev, &Context::new(actual))
    }

    #[test]
    fn parses_call_with_mixed_operands() {
        let p = parse_action(r#" subtractor 10 .a.b[1] "3" "#, 0).unwrap();
        assert_eq!(
            p.commands,
            vec![Command::Call {
                name: "subtractor".into(),
                args: vec![
                    Operand::Int(10),
                    Operand::Path(DocPath::root().key("a").key("b").index(1)),
                    Operand::Str("3".into()),
                ],
            }]
        );
    }

    #[test]
    fn actual_prefix_is_the_root() {
        let p = parse_action(".actual.name", 0).unwrap();
        assert_eq!(
            p.commands,
            vec![Command::Operand(Operand::Path(DocPath::root().key("name")))]
        );
        let p = parse_action(".", 0).unwrap();
        assert_eq!(
            p.commands,
            vec![Command::Operand(Operand::Path(DocPath::root()))]
        );
    }

    #[test]
    fn keywords_parse_as_literals() {
        let p = parse_action("notEmpty nil", 0).unwrap();
        assert_eq!(
            p.commands,
            vec![Command::Call {
                name: "notEmpty".into(),
                args: vec![Operand::Nil]
            }]
        );
    }

    #[test]
    fn pipelines_feed_the_last_argument() {
        let doc = json!({"n": 3});
        assert_eq!(
            eval("subtractor 10 2 | subtractor 100", &doc).unwrap(),
            Evaluated::Value(json!(92))
        );
        assert_eq!(
            eval(".n | subtractor 7", &doc).unwrap(),
            Evaluated::Value(json!(4))
        );
    }

    #[test]
    fn nested_calls() {
        let doc = json!({"id": "abc"});
        let direct = eval(r#"b64enc "abc""#, &doc).unwrap();
        assert_eq!(eval("b64enc (notEmpty .id)", &doc).unwrap(), direct);
    }

    #[test]
    fn missing_path_is_null() {
        let doc = json!({});
        assert!(eval("notEmpty .actual.name", &doc).unwrap().is_mismatch());
        assert_eq!(eval(".x.y[3]", &doc).unwrap(), Evaluated::Value(Value::Null));
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        let err = parse_action("b64enc (sha256enc \"x\"", 5).unwrap_err();
        assert!(matches!(err, VerifyError::Syntax { .. }), "{err}");
        let err = parse_action("", 7).unwrap_err();
        assert_eq!(err, VerifyError::syntax(7, "missing value for command"));
        let err = parse_action("\"a\" \"b\"", 0).unwrap_err();
        assert_eq!(err, VerifyError::syntax(4, "unexpected operand after value"));
        let err = parse_action("b64enc sha256enc", 0).unwrap_err();
        assert!(matches!(err, VerifyError::Syntax { offset: 7, .. }), "{err}");
        let err = parse_action("\"x\" | \"y\"", 0).unwrap_err();
        assert!(matches!(err, VerifyError::Syntax { .. }));
    }

    #[test]
    fn unknown_function_surfaces_at_eval() {
        let err = eval("frobnicate 1", &json!({})).unwrap_err();
        assert_eq!(err, VerifyError::UnknownFunction("frobnicate".into()));
    }
}
