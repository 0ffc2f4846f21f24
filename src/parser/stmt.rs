use super::*;

use super::expr::{parse_expression, parse_part_ref};

pub(crate) struct RawBlock {
    pub(crate) kind: HandlerKind,
    pub(crate) name: String,
    pub(crate) parameters: Vec<String>,
    pub(crate) body: Vec<String>,
}

fn grammar(detail: impl Into<String>) -> CompileFault {
    CompileFault {
        stage: CompileStage::Grammar,
        detail: detail.into(),
    }
}

fn semantics(detail: impl Into<String>) -> CompileFault {
    CompileFault {
        stage: CompileStage::Semantics,
        detail: detail.into(),
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(
        normalize_name(word).as_str(),
        "on" | "function"
            | "end"
            | "if"
            | "then"
            | "else"
            | "repeat"
            | "exit"
            | "next"
            | "pass"
            | "return"
            | "global"
            | "this"
            | "current"
            | "into"
            | "to"
            | "times"
            | "until"
            | "while"
            | "with"
            | "for"
            | "in"
            | "is"
            | "not"
            | "part"
            | "button"
            | "field"
            | "card"
            | "stack"
            | "background"
            | "world"
    )
}

/// Strip a trailing `--` comment, honoring string literals.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'-' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'-' => {
                return &line[..i];
            }
            _ => {}
        }
        i += 1;
    }
    line
}

fn identifier(word: &str) -> Parse<String> {
    let word = word.trim();
    if word.is_empty() || !word.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(grammar(format!("\"{word}\" is not a valid identifier")));
    }
    if word.as_bytes()[0].is_ascii_digit() {
        return Err(grammar(format!("\"{word}\" is not a valid identifier")));
    }
    Ok(word.to_string())
}

/// Grammar phase: split the script into handler blocks. Anything this
/// rejects is a structural fault; the statement bodies are carried
/// through raw for the semantic phase.
pub(crate) fn match_handler_blocks(src: &str) -> Parse<Vec<RawBlock>> {
    let lines: Vec<&str> = src.lines().map(strip_comment).collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;
        if line.is_empty() {
            continue;
        }

        let mut cur = Cursor::new(line);
        let kind = if cur.consume_word("on") {
            HandlerKind::Command
        } else if cur.consume_word("function") {
            HandlerKind::Function
        } else {
            return Err(grammar(format!("expected a handler block, found \"{line}\"")));
        };

        let Some(name) = cur.read_word() else {
            return Err(grammar("expected a handler name"));
        };
        if is_reserved(name) {
            return Err(grammar(format!("\"{name}\" cannot be used as a handler name")));
        }
        let name = name.to_string();

        let parameters = match kind {
            HandlerKind::Command => {
                let rest = cur.rest();
                if rest.is_empty() {
                    Vec::new()
                } else {
                    rest.split(',').map(identifier).collect::<Parse<Vec<_>>>()?
                }
            }
            HandlerKind::Function => {
                if !cur.consume_symbol("(") {
                    return Err(grammar(format!("expected '(' after function {name}")));
                }
                let mut params = Vec::new();
                if !cur.consume_symbol(")") {
                    loop {
                        let Some(word) = cur.read_word() else {
                            return Err(grammar("expected a parameter name"));
                        };
                        params.push(identifier(word)?);
                        if cur.consume_symbol(")") {
                            break;
                        }
                        if !cur.consume_symbol(",") {
                            return Err(grammar("expected ',' or ')' in parameter list"));
                        }
                    }
                }
                if !cur.at_end() {
                    return Err(grammar(format!("unexpected text after function {name} header")));
                }
                params
            }
        };

        let mut body = Vec::new();
        let mut closed = false;
        while i < lines.len() {
            let body_line = lines[i].trim();
            i += 1;
            if body_line.is_empty() {
                continue;
            }
            let mut end_cur = Cursor::new(body_line);
            if end_cur.consume_word("end") {
                match end_cur.read_word() {
                    Some(word) if normalize_name(word) == normalize_name(&name) => {
                        closed = true;
                        break;
                    }
                    Some(word) if normalize_name(word) == "repeat" => {
                        body.push(body_line.to_string());
                        continue;
                    }
                    Some(word) => {
                        return Err(grammar(format!(
                            "mismatched end: expected \"end {name}\", found \"end {word}\""
                        )));
                    }
                    None => return Err(grammar("expected a name after \"end\"")),
                }
            }
            body.push(body_line.to_string());
        }
        if !closed {
            return Err(grammar(format!("handler \"{name}\" is missing its \"end {name}\"")));
        }

        blocks.push(RawBlock {
            kind,
            name,
            parameters,
            body,
        });
    }

    Ok(blocks)
}

/// Semantic phase: one raw block into a handler definition.
pub(crate) fn parse_handler_block(block: RawBlock) -> Parse<HandlerDefinition> {
    let mut pos = 0;
    let statements = parse_statement_run(&block.body, &mut pos, &block.parameters, None)?;
    Ok(HandlerDefinition {
        kind: block.kind,
        name: block.name,
        parameters: block.parameters,
        statements,
    })
}

/// Parse statements until the lines run out, or until `end <terminator>`
/// when one is expected (repeat bodies).
fn parse_statement_run(
    lines: &[String],
    pos: &mut usize,
    params: &[String],
    terminator: Option<&str>,
) -> Parse<Vec<Statement>> {
    let mut statements = Vec::new();
    loop {
        if *pos >= lines.len() {
            return match terminator {
                None => Ok(statements),
                Some(t) => Err(semantics(format!("missing \"end {t}\""))),
            };
        }

        let line = &lines[*pos];
        let mut cur = Cursor::new(line);
        if cur.consume_word("end") {
            if let Some(t) = terminator {
                if cur.consume_word(t) && cur.at_end() {
                    *pos += 1;
                    return Ok(statements);
                }
            }
            return Err(semantics(format!("unexpected \"{line}\"")));
        }

        statements.push(parse_line(lines, pos, params)?);
    }
}

fn parse_line(lines: &[String], pos: &mut usize, params: &[String]) -> Parse<Statement> {
    let line = &lines[*pos];
    let mut cur = Cursor::new(line);

    if cur.consume_word("repeat") {
        *pos += 1;
        let control = parse_repeat_control(&mut cur, params)?;
        let body = parse_statement_run(lines, pos, params, Some("repeat"))?;
        return Ok(Statement::Repeat { control, body });
    }

    if cur.consume_word("if") {
        let condition = parse_expression(&mut cur, params)?;
        if cur.consume_word("then") {
            // Inline form: the consequent shares the line.
            let then_branch = vec![parse_simple_statement(&mut cur, params)?];
            expect_line_end(&mut cur)?;
            *pos += 1;
            return Ok(Statement::IfThen {
                condition,
                then_branch,
                else_branch: Vec::new(),
            });
        }
        expect_line_end(&mut cur)?;
        *pos += 1;

        // Single-line form: `then` and optional `else` on their own lines.
        let Some(then_line) = lines.get(*pos) else {
            return Err(semantics("expected \"then\" after if"));
        };
        let mut then_cur = Cursor::new(then_line);
        if !then_cur.consume_word("then") {
            return Err(semantics("expected \"then\" after if"));
        }
        let then_branch = vec![parse_simple_statement(&mut then_cur, params)?];
        expect_line_end(&mut then_cur)?;
        *pos += 1;

        let mut else_branch = Vec::new();
        if let Some(else_line) = lines.get(*pos) {
            let mut else_cur = Cursor::new(else_line);
            if else_cur.consume_word("else") {
                else_branch.push(parse_simple_statement(&mut else_cur, params)?);
                expect_line_end(&mut else_cur)?;
                *pos += 1;
            }
        }

        return Ok(Statement::IfThen {
            condition,
            then_branch,
            else_branch,
        });
    }

    let statement = parse_simple_statement(&mut cur, params)?;
    expect_line_end(&mut cur)?;
    *pos += 1;
    Ok(statement)
}

fn expect_line_end(cur: &mut Cursor<'_>) -> Parse<()> {
    if cur.at_end() {
        Ok(())
    } else {
        Err(semantics(format!("unexpected trailing text \"{}\"", cur.rest())))
    }
}

fn parse_repeat_control(cur: &mut Cursor<'_>, params: &[String]) -> Parse<RepeatControl> {
    if cur.consume_word("until") {
        let condition = parse_expression(cur, params)?;
        expect_line_end(cur)?;
        return Ok(RepeatControl::Until { condition });
    }
    if cur.consume_word("while") {
        let condition = parse_expression(cur, params)?;
        expect_line_end(cur)?;
        return Ok(RepeatControl::While { condition });
    }
    if cur.consume_word("with") {
        let Some(variable) = cur.read_word() else {
            return Err(semantics("expected a loop variable after \"repeat with\""));
        };
        let variable = variable.to_string();
        if !cur.consume_symbol("=") {
            return Err(semantics("expected '=' in \"repeat with\""));
        }
        let start = parse_expression(cur, params)?;
        if !cur.consume_word("to") {
            return Err(semantics("expected \"to\" in \"repeat with\""));
        }
        let finish = parse_expression(cur, params)?;
        expect_line_end(cur)?;
        return Ok(RepeatControl::WithRange {
            variable,
            start,
            finish,
        });
    }

    cur.consume_word("for");
    let count = parse_expression(cur, params)?;
    if !cur.consume_word("times") {
        return Err(semantics("expected \"times\" after the repeat count"));
    }
    expect_line_end(cur)?;
    Ok(RepeatControl::ForTimes { count })
}

/// Statements that fit on one line: everything except repeat blocks
/// and the multi-line if form.
fn parse_simple_statement(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Statement> {
    if cur.consume_word("put") {
        let value = parse_expression(cur, params)?;
        if !cur.consume_word("into") {
            return Err(semantics("expected \"into\" after put"));
        }
        let global = cur.consume_word("global");
        let Some(destination) = cur.read_word() else {
            return Err(semantics("expected a variable name after \"into\""));
        };
        return Ok(Statement::Message {
            name: "putInto".to_string(),
            args: vec![
                value,
                Argument::Value(Value::text(destination)),
                Argument::Value(Value::Bool(global)),
            ],
        });
    }

    if cur.consume_word("set") {
        let property = match cur.read_string_literal() {
            Some(literal) => literal.map_err(semantics)?,
            None => match cur.read_word() {
                Some(word) => word.to_string(),
                None => return Err(semantics("expected a property name after set")),
            },
        };
        if !cur.consume_word("to") {
            return Err(semantics("expected \"to\" after the property name"));
        }
        let value = parse_expression(cur, params)?;
        let target = if cur.consume_word("in") {
            Argument::Node(InterpreterNode::PartRef(parse_part_ref(cur)?))
        } else {
            Argument::Value(Value::Null)
        };
        return Ok(Statement::Message {
            name: "setProperty".to_string(),
            args: vec![Argument::Value(Value::text(property)), value, target],
        });
    }

    if cur.consume_word("answer") {
        let value = parse_expression(cur, params)?;
        return Ok(Statement::Message {
            name: "answer".to_string(),
            args: vec![value],
        });
    }

    if cur.consume_word("go") {
        if !cur.consume_word("to") {
            return Err(semantics("expected \"to\" after go"));
        }
        for direction in ["next", "previous"] {
            if cur.consume_word(direction) {
                let object = match cur.read_word() {
                    Some(word) => match PartKind::from_type_name(word) {
                        Some(kind) => kind.type_name().to_string(),
                        None => {
                            return Err(semantics(format!("cannot go to a \"{word}\"")));
                        }
                    },
                    None => "card".to_string(),
                };
                return Ok(Statement::Message {
                    name: "go to direction".to_string(),
                    args: vec![
                        Argument::Value(Value::text(direction)),
                        Argument::Value(Value::text(object)),
                    ],
                });
            }
        }
        let Some(word) = cur.read_word() else {
            return Err(semantics("expected a destination after \"go to\""));
        };
        let Some(kind) = PartKind::from_type_name(word) else {
            return Err(semantics(format!("cannot go to a \"{word}\"")));
        };
        let Some(id) = cur.read_number() else {
            return Err(semantics("expected a part id after the destination type"));
        };
        return Ok(Statement::Message {
            name: "go to reference".to_string(),
            args: vec![
                Argument::Value(Value::text(kind.type_name())),
                Argument::Value(Value::Number(id)),
            ],
        });
    }

    if cur.consume_word("exit") {
        if cur.consume_word("repeat") {
            return Ok(Statement::ExitRepeat);
        }
        let Some(handler) = cur.read_word() else {
            return Err(semantics("expected a handler name after exit"));
        };
        return Ok(Statement::ExitHandler {
            handler: handler.to_string(),
        });
    }

    if cur.consume_word("next") {
        if cur.consume_word("repeat") {
            return Ok(Statement::NextRepeat);
        }
        return Err(semantics("expected \"repeat\" after next"));
    }

    if cur.consume_word("pass") {
        let Some(handler) = cur.read_word() else {
            return Err(semantics("expected a handler name after pass"));
        };
        return Ok(Statement::PassHandler {
            handler: handler.to_string(),
        });
    }

    if cur.consume_word("return") {
        let value = parse_expression(cur, params)?;
        return Ok(Statement::Return { value });
    }

    if cur.consume_word("if") {
        let condition = parse_expression(cur, params)?;
        if !cur.consume_word("then") {
            return Err(semantics("expected \"then\" in inline if"));
        }
        let then_branch = vec![parse_simple_statement(cur, params)?];
        return Ok(Statement::IfThen {
            condition,
            then_branch,
            else_branch: Vec::new(),
        });
    }

    // Anything else is an arbitrary command message.
    let Some(word) = cur.read_word() else {
        return Err(semantics(format!("cannot parse statement \"{}\"", cur.rest())));
    };
    if is_reserved(word) {
        return Err(semantics(format!("unexpected \"{word}\"")));
    }
    let name = word.to_string();
    let mut args = Vec::new();
    if !cur.at_end() {
        loop {
            args.push(parse_expression(cur, params)?);
            if !cur.consume_symbol(",") {
                break;
            }
        }
    }
    Ok(Statement::Message { name, args })
}
