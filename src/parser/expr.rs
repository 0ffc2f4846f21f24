use super::*;

fn fault(detail: impl Into<String>) -> CompileFault {
    CompileFault {
        stage: CompileStage::Semantics,
        detail: detail.into(),
    }
}

/// Words that can never begin an expression; hitting one means the
/// expression ended early or a clause keyword is missing its operand.
fn is_stop_word(word: &str) -> bool {
    matches!(
        normalize_name(word).as_str(),
        "then" | "else" | "into" | "to" | "times" | "until" | "while" | "end" | "in"
    )
}

fn parameter_index(params: &[String], word: &str) -> Option<usize> {
    let key = normalize_name(word);
    params.iter().position(|param| normalize_name(param) == key)
}

fn binary(op: ArithmeticOp, left: Argument, right: Argument) -> Argument {
    Argument::Node(InterpreterNode::Arithmetic {
        op,
        operands: vec![left, right],
    })
}

pub(crate) fn parse_expression(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Argument> {
    parse_comparison(cur, params)
}

fn parse_comparison(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Argument> {
    let mut left = parse_concat(cur, params)?;
    loop {
        cur.skip_ws();
        let op = if cur.consume_symbol(">=") {
            ArithmeticOp::GreaterOrEqual
        } else if cur.consume_symbol("<=") {
            ArithmeticOp::LessOrEqual
        } else if cur.consume_symbol("!=") {
            ArithmeticOp::NotEqual
        } else if cur.consume_symbol(">") {
            ArithmeticOp::Greater
        } else if cur.consume_symbol("<") {
            ArithmeticOp::Less
        } else if cur.consume_symbol("=") {
            ArithmeticOp::Equal
        } else if cur.consume_word("is") {
            if cur.consume_word("not") {
                ArithmeticOp::NotEqual
            } else {
                ArithmeticOp::Equal
            }
        } else {
            return Ok(left);
        };
        let right = parse_concat(cur, params)?;
        left = binary(op, left, right);
    }
}

fn parse_concat(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Argument> {
    let mut left = parse_sum(cur, params)?;
    loop {
        let op = if cur.consume_symbol("&&") {
            ArithmeticOp::ConcatSpace
        } else if cur.consume_symbol("&") {
            ArithmeticOp::Concat
        } else {
            return Ok(left);
        };
        let right = parse_sum(cur, params)?;
        left = binary(op, left, right);
    }
}

fn parse_sum(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Argument> {
    let mut left = parse_product(cur, params)?;
    loop {
        let op = if cur.consume_symbol("+") {
            ArithmeticOp::Add
        } else if cur.consume_symbol("-") {
            ArithmeticOp::Subtract
        } else {
            return Ok(left);
        };
        let right = parse_product(cur, params)?;
        left = binary(op, left, right);
    }
}

fn parse_product(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Argument> {
    let mut left = parse_unary(cur, params)?;
    while cur.consume_symbol("*") {
        let right = parse_unary(cur, params)?;
        left = binary(ArithmeticOp::Multiply, left, right);
    }
    Ok(left)
}

fn parse_unary(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Argument> {
    if cur.consume_symbol("-") {
        let operand = parse_unary(cur, params)?;
        return Ok(binary(
            ArithmeticOp::Subtract,
            Argument::Value(Value::Number(0.0)),
            operand,
        ));
    }
    parse_primary(cur, params)
}

fn parse_primary(cur: &mut Cursor<'_>, params: &[String]) -> Parse<Argument> {
    if let Some(literal) = cur.read_string_literal() {
        return literal.map(|text| Argument::Value(Value::Text(text))).map_err(fault);
    }
    if let Some(number) = cur.read_number() {
        return Ok(Argument::Value(Value::Number(number)));
    }
    if cur.consume_symbol("(") {
        let inner = parse_expression(cur, params)?;
        if !cur.consume_symbol(")") {
            return Err(fault("expected ')'"));
        }
        return Ok(inner);
    }

    let Some(word) = cur.peek_word() else {
        return Err(fault(format!("expected an expression at \"{}\"", cur.rest())));
    };
    if is_stop_word(word) {
        return Err(fault(format!("expected an expression before \"{word}\"")));
    }

    match normalize_name(word).as_str() {
        "true" => {
            cur.read_word();
            Ok(Argument::Value(Value::Bool(true)))
        }
        "false" => {
            cur.read_word();
            Ok(Argument::Value(Value::Bool(false)))
        }
        "this" | "current" | "part" => {
            parse_part_ref(cur).map(|node| Argument::Node(InterpreterNode::PartRef(node)))
        }
        other if PartKind::from_type_name(other).is_some() => {
            parse_part_ref(cur).map(|node| Argument::Node(InterpreterNode::PartRef(node)))
        }
        _ => {
            let Some(name) = cur.read_word() else {
                return Err(fault("expected an expression"));
            };
            let name = name.to_string();
            match parameter_index(params, &name) {
                Some(index) => Ok(Argument::Node(InterpreterNode::Parameter { name, index })),
                None => Ok(Argument::Node(InterpreterNode::Variable { name })),
            }
        }
    }
}

/// `this button`, `current card`, `button "Ok"`, `field id 3`,
/// `part 2`.
pub(crate) fn parse_part_ref(cur: &mut Cursor<'_>) -> Parse<PartRefNode> {
    if cur.consume_word("this") {
        return parse_relation_ref(cur, Relation::This);
    }
    if cur.consume_word("current") {
        return parse_relation_ref(cur, Relation::Current);
    }

    let object_type = if cur.consume_word("part") {
        None
    } else {
        let Some(word) = cur.read_word() else {
            return Err(fault("expected a part reference"));
        };
        match PartKind::from_type_name(word) {
            Some(kind) => Some(kind),
            None => return Err(fault(format!("\"{word}\" is not a part type"))),
        }
    };

    let qualifier = if cur.consume_word("id") {
        match cur.read_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Qualifier::Id(n as usize),
            _ => return Err(fault("expected a part id")),
        }
    } else if let Some(literal) = cur.read_string_literal() {
        Qualifier::Name(literal.map_err(fault)?)
    } else if let Some(n) = cur.read_number() {
        if n < 1.0 || n.fract() != 0.0 {
            return Err(fault("part indices must be 1 or greater"));
        }
        Qualifier::Index(n as usize)
    } else {
        return Err(fault("expected a part qualifier (index, id, or name)"));
    };

    Ok(PartRefNode {
        object_type,
        relation: None,
        qualifier: Some(qualifier),
    })
}

fn parse_relation_ref(cur: &mut Cursor<'_>, relation: Relation) -> Parse<PartRefNode> {
    let Some(word) = cur.read_word() else {
        return Err(fault("expected a part type after this/current"));
    };
    let Some(kind) = PartKind::from_type_name(word) else {
        return Err(fault(format!("\"{word}\" is not a part type")));
    };
    Ok(PartRefNode {
        object_type: Some(kind),
        relation: Some(relation),
        qualifier: None,
    })
}
