use super::*;

/// A fault caused by authored script content. Recoverable: normalized
/// to an error message on the broadcast channel, never an unwound
/// stack.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScriptFault {
    pub(crate) detail: String,
}

impl ScriptFault {
    pub(crate) fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Execution-layer failure: either internal misuse of the runtime API
/// (stays a hard error) or a script fault (reported, recovered).
#[derive(Debug)]
pub(crate) enum ExecFault {
    Hard(Error),
    Script(ScriptFault),
}

impl From<Error> for ExecFault {
    fn from(error: Error) -> Self {
        Self::Hard(error)
    }
}

impl From<ScriptFault> for ExecFault {
    fn from(fault: ScriptFault) -> Self {
        Self::Script(fault)
    }
}

pub(crate) type Exec<T> = std::result::Result<T, ExecFault>;

pub(crate) fn script_fault(detail: impl Into<String>) -> ExecFault {
    ExecFault::Script(ScriptFault::new(detail))
}

impl System {
    pub(crate) fn evaluate_argument(&self, part: PartId, argument: &Argument) -> Exec<Value> {
        match argument {
            Argument::Value(value) => Ok(value.clone()),
            Argument::Node(node) => self.evaluate_node(part, node),
        }
    }

    /// Evaluate one interpreter node against the invoking part's live
    /// execution context. Read-only: evaluation never mutates the
    /// part tree.
    pub(crate) fn evaluate_node(&self, part: PartId, node: &InterpreterNode) -> Exec<Value> {
        match node {
            InterpreterNode::Variable { name } => {
                let frame = self.active_frame(part)?;
                if let Some(value) = frame.local(name) {
                    return Ok(value.clone());
                }
                Ok(self
                    .globals
                    .get(&normalize_name(name))
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            InterpreterNode::Parameter { index, .. } => {
                let frame = self.active_frame(part)?;
                Ok(frame.parameter(*index).cloned().unwrap_or(Value::Null))
            }
            InterpreterNode::PartRef(reference) => {
                self.resolve_part_ref(part, reference).map(Value::Part)
            }
            InterpreterNode::Arithmetic { op, operands } => {
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    values.push(self.evaluate_argument(part, operand)?);
                }
                apply_arithmetic(*op, &values)
            }
        }
    }

    fn active_frame(&self, part: PartId) -> Exec<&Frame> {
        let context = &self.parts.get(part)?.context;
        context.active().ok_or_else(|| {
            script_fault(format!("no execution context is active for part {part}"))
        })
    }

    pub(crate) fn resolve_part_ref(
        &self,
        context_part: PartId,
        node: &PartRefNode,
    ) -> Exec<PartId> {
        if let Some(relation) = node.relation {
            let Some(wanted) = node.object_type else {
                return Err(script_fault("part reference is missing an object type"));
            };
            return match relation {
                Relation::This => {
                    let part = self.parts.get(context_part)?;
                    if part.kind == wanted {
                        return Ok(part.id);
                    }
                    let mut cursor = part.owner;
                    while let Some(id) = cursor {
                        let owner = self.parts.get(id)?;
                        if owner.kind == wanted {
                            return Ok(id);
                        }
                        cursor = owner.owner;
                    }
                    Err(script_fault(format!(
                        "no {wanted} encloses this {} [{}]",
                        part.kind, part.id
                    )))
                }
                Relation::Current => match wanted {
                    PartKind::Stack => self
                        .current_stack
                        .ok_or_else(|| script_fault("there is no current stack")),
                    PartKind::Card => self
                        .current_card
                        .ok_or_else(|| script_fault("there is no current card")),
                    other => Err(script_fault(format!(
                        "\"current\" does not apply to a {other}"
                    ))),
                },
            };
        }

        let Some(qualifier) = &node.qualifier else {
            return Err(script_fault(
                "part reference has neither a relation nor a qualifier",
            ));
        };
        let part = self.parts.get(context_part)?;

        match qualifier {
            Qualifier::Id(raw) => {
                let id = PartId(*raw);
                if !self.parts.contains(id) {
                    return Err(script_fault(format!("no part has id {raw}")));
                }
                let target = self.parts.get(id)?;
                if let Some(wanted) = node.object_type {
                    if target.kind != wanted {
                        return Err(script_fault(format!(
                            "part {raw} is a {}, not a {wanted}",
                            target.kind
                        )));
                    }
                }
                Ok(id)
            }
            Qualifier::Name(name) => {
                for sub in &part.subparts {
                    let subpart = self.parts.get(*sub)?;
                    if let Some(wanted) = node.object_type {
                        if subpart.kind != wanted {
                            continue;
                        }
                    }
                    let found = subpart
                        .properties
                        .find("name")
                        .map(|prop| prop.value(subpart))
                        .unwrap_or(Value::Null);
                    if text_eq(&found.to_string(), name) {
                        return Ok(*sub);
                    }
                }
                let wanted = node
                    .object_type
                    .map(PartKind::type_name)
                    .unwrap_or("part");
                Err(script_fault(format!(
                    "{} [{}] has no {wanted} named \"{name}\"",
                    part.kind, part.id
                )))
            }
            Qualifier::Index(index) => {
                if *index < 1 {
                    return Err(script_fault("part indices must be 1 or greater"));
                }
                let mut seen = 0usize;
                for sub in &part.subparts {
                    let subpart = self.parts.get(*sub)?;
                    if let Some(wanted) = node.object_type {
                        if subpart.kind != wanted {
                            continue;
                        }
                    }
                    seen += 1;
                    if seen == *index {
                        return Ok(*sub);
                    }
                }
                let wanted = node
                    .object_type
                    .map(PartKind::type_name)
                    .unwrap_or("part");
                Err(script_fault(format!(
                    "{} [{}] has no {wanted} numbered {index}",
                    part.kind, part.id
                )))
            }
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return a == b;
    }
    text_eq(&left.to_string(), &right.to_string())
}

fn values_ordering(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return a.partial_cmp(&b);
    }
    Some(normalize_name(&left.to_string()).cmp(&normalize_name(&right.to_string())))
}

pub(crate) fn apply_arithmetic(op: ArithmeticOp, values: &[Value]) -> Exec<Value> {
    let (left, right) = match values {
        [left, right] => (left, right),
        _ => {
            return Err(script_fault(format!(
                "operator expects two operands, got {}",
                values.len()
            )));
        }
    };

    let numeric = |left: &Value, right: &Value| -> Exec<(f64, f64)> {
        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(script_fault(format!(
                "cannot do arithmetic on \"{left}\" and \"{right}\""
            ))),
        }
    };

    use std::cmp::Ordering;
    let ordered = |wanted: &[Ordering]| -> Value {
        match values_ordering(left, right) {
            Some(ordering) => Value::Bool(wanted.contains(&ordering)),
            None => Value::Bool(false),
        }
    };

    Ok(match op {
        ArithmeticOp::Add => {
            let (a, b) = numeric(left, right)?;
            Value::Number(a + b)
        }
        ArithmeticOp::Subtract => {
            let (a, b) = numeric(left, right)?;
            Value::Number(a - b)
        }
        ArithmeticOp::Multiply => {
            let (a, b) = numeric(left, right)?;
            Value::Number(a * b)
        }
        ArithmeticOp::Concat => Value::Text(format!("{left}{right}")),
        ArithmeticOp::ConcatSpace => Value::Text(format!("{left} {right}")),
        ArithmeticOp::Equal => Value::Bool(values_equal(left, right)),
        ArithmeticOp::NotEqual => Value::Bool(!values_equal(left, right)),
        ArithmeticOp::Greater => ordered(&[Ordering::Greater]),
        ArithmeticOp::GreaterOrEqual => ordered(&[Ordering::Greater, Ordering::Equal]),
        ArithmeticOp::Less => ordered(&[Ordering::Less]),
        ArithmeticOp::LessOrEqual => ordered(&[Ordering::Less, Ordering::Equal]),
    })
}
