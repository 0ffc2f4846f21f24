use super::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Handled(Value),
    NotUnderstood,
}

/// Where statement execution goes next after a statement completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecFlow {
    Normal,
    ExitRepeat,
    NextRepeat,
    ExitHandler,
    Pass,
}

/// Live state of one handler invocation.
#[derive(Debug)]
pub(crate) struct Activation {
    pub(crate) part: PartId,
    pub(crate) handler: String,
    /// Sender chain stamped onto outgoing messages; ends with the
    /// executing part itself.
    pub(crate) senders: Vec<SenderRef>,
}

fn kind_word(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Command => "command",
        MessageKind::Function => "function",
        MessageKind::Error => "error",
        MessageKind::Compile => "compile",
    }
}

impl System {
    const DISPATCH_STACK_RED_ZONE: usize = 64 * 1024;
    const DISPATCH_STACK_SIZE: usize = 16 * 1024 * 1024;
    const REPEAT_ITERATION_LIMIT: usize = 1_000_000;

    pub fn send_command(
        &mut self,
        target: PartId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Delivery> {
        self.send_message(Message::command(name, args), target)
    }

    pub fn call_function(
        &mut self,
        target: PartId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Delivery> {
        self.send_message(Message::function(name, args), target)
    }

    /// Route a message: a matching handler on the target runs
    /// synchronously; otherwise the message delegates up the ownership
    /// chain until the terminal resolver handles it or reports
    /// MessageNotUnderstood. Exactly one chain walk per call.
    pub fn send_message(&mut self, message: Message, target: PartId) -> Result<Delivery> {
        self.parts.get(target)?;
        stacker::maybe_grow(
            Self::DISPATCH_STACK_RED_ZONE,
            Self::DISPATCH_STACK_SIZE,
            || self.dispatch(message, target),
        )
    }

    fn dispatch(&mut self, message: Message, origin: PartId) -> Result<Delivery> {
        let mut target = origin;
        loop {
            let handler = self
                .parts
                .get(target)?
                .handler(message.kind, &message.name)
                .cloned();
            if let Some(def) = handler {
                let (delivery, passed) = self.invoke_handler(target, &def, &message)?;
                if !passed {
                    self.trace_dispatch(&message, target, "handled");
                    return Ok(delivery);
                }
            }
            match self.parts.get(target)?.owner {
                Some(owner) => target = owner,
                None => return self.resolve_at_root(&message, origin),
            }
        }
    }

    pub(crate) fn invoke_handler(
        &mut self,
        target: PartId,
        def: &HandlerDefinition,
        message: &Message,
    ) -> Result<(Delivery, bool)> {
        // Positional binding: call-site arguments map to parameter
        // names in declaration order. Late-bound nodes evaluate first.
        let mut bindings = Vec::with_capacity(def.parameters.len());
        for (index, parameter) in def.parameters.iter().enumerate() {
            let value = match message.args.get(index) {
                Some(argument) => match self.evaluate_argument(target, argument) {
                    Ok(value) => value,
                    Err(ExecFault::Hard(error)) => return Err(error),
                    Err(ExecFault::Script(fault)) => {
                        self.report_script_fault(message.kind, &message.senders, target, fault)?;
                        return Ok((Delivery::Handled(Value::Null), false));
                    }
                },
                None => Value::Null,
            };
            bindings.push((parameter.clone(), value));
        }

        let mut activation = Activation {
            part: target,
            handler: normalize_name(&def.name),
            senders: {
                let mut senders = message.senders.clone();
                senders.push(self.parts.get(target)?.sender_ref());
                senders
            },
        };

        self.parts.get_mut(target)?.context.select(&def.name, bindings);
        let flow = self.execute_stmts(&mut activation, &def.statements);
        let finished = self.parts.get_mut(target)?.context.exit();
        let result = finished.and_then(|frame| frame.result).unwrap_or(Value::Null);

        match flow {
            Ok(ExecFlow::Pass) => Ok((Delivery::Handled(result), true)),
            Ok(_) => Ok((Delivery::Handled(result), false)),
            Err(ExecFault::Hard(error)) => Err(error),
            Err(ExecFault::Script(fault)) => {
                let senders = std::mem::take(&mut activation.senders);
                self.report_script_fault(message.kind, &senders, target, fault)?;
                Ok((Delivery::Handled(Value::Null), false))
            }
        }
    }

    pub(crate) fn execute_stmts(
        &mut self,
        activation: &mut Activation,
        stmts: &[Statement],
    ) -> Exec<ExecFlow> {
        stacker::maybe_grow(
            Self::DISPATCH_STACK_RED_ZONE,
            Self::DISPATCH_STACK_SIZE,
            || self.execute_stmts_impl(activation, stmts),
        )
    }

    fn execute_stmts_impl(
        &mut self,
        activation: &mut Activation,
        stmts: &[Statement],
    ) -> Exec<ExecFlow> {
        for stmt in stmts {
            match self.execute_stmt(activation, stmt)? {
                ExecFlow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(ExecFlow::Normal)
    }

    fn execute_stmt(&mut self, activation: &mut Activation, stmt: &Statement) -> Exec<ExecFlow> {
        match stmt {
            Statement::Message { name, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for argument in args {
                    evaluated.push(self.evaluate_argument(activation.part, argument)?);
                }
                let message = Message {
                    kind: MessageKind::Command,
                    name: name.clone(),
                    args: evaluated.into_iter().map(Argument::Value).collect(),
                    senders: activation.senders.clone(),
                };
                let delivery = self
                    .send_message(message, activation.part)
                    .map_err(ExecFault::Hard)?;
                let result = match delivery {
                    Delivery::Handled(value) => value,
                    Delivery::NotUnderstood => Value::Null,
                };
                self.parts
                    .get_mut(activation.part)?
                    .context
                    .set_local("it", result);
                Ok(ExecFlow::Normal)
            }
            Statement::IfThen {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.evaluate_argument(activation.part, condition)?;
                if condition.is_truthy() {
                    self.execute_stmts(activation, then_branch)
                } else {
                    self.execute_stmts(activation, else_branch)
                }
            }
            Statement::Repeat { control, body } => self.execute_repeat(activation, control, body),
            Statement::ExitRepeat => Ok(ExecFlow::ExitRepeat),
            Statement::NextRepeat => Ok(ExecFlow::NextRepeat),
            Statement::ExitHandler { handler } => {
                if normalize_name(handler) == activation.handler {
                    Ok(ExecFlow::ExitHandler)
                } else {
                    Err(script_fault(format!(
                        "\"exit {handler}\" does not match the running handler"
                    )))
                }
            }
            Statement::PassHandler { handler } => {
                if normalize_name(handler) == activation.handler {
                    Ok(ExecFlow::Pass)
                } else {
                    Err(script_fault(format!(
                        "\"pass {handler}\" does not match the running handler"
                    )))
                }
            }
            Statement::Return { value } => {
                let value = self.evaluate_argument(activation.part, value)?;
                if let Some(frame) = self.parts.get_mut(activation.part)?.context.active_mut() {
                    frame.result = Some(value);
                }
                Ok(ExecFlow::ExitHandler)
            }
        }
    }

    fn execute_repeat(
        &mut self,
        activation: &mut Activation,
        control: &RepeatControl,
        body: &[Statement],
    ) -> Exec<ExecFlow> {
        match control {
            RepeatControl::ForTimes { count } => {
                let count = self.evaluate_argument(activation.part, count)?;
                let Some(n) = count.as_number() else {
                    return Err(script_fault(format!(
                        "repeat count \"{count}\" is not a number"
                    )));
                };
                let times = if n.is_finite() && n > 0.0 { n.floor() as usize } else { 0 };
                for _ in 0..times {
                    match self.execute_stmts(activation, body)? {
                        ExecFlow::ExitRepeat => break,
                        ExecFlow::NextRepeat | ExecFlow::Normal => {}
                        flow @ (ExecFlow::ExitHandler | ExecFlow::Pass) => return Ok(flow),
                    }
                }
                Ok(ExecFlow::Normal)
            }
            RepeatControl::Until { condition } => {
                self.conditional_repeat(activation, condition, body, false)
            }
            RepeatControl::While { condition } => {
                self.conditional_repeat(activation, condition, body, true)
            }
            RepeatControl::WithRange {
                variable,
                start,
                finish,
            } => {
                let start = self.evaluate_argument(activation.part, start)?;
                let finish = self.evaluate_argument(activation.part, finish)?;
                let (Some(mut index), Some(limit)) = (start.as_number(), finish.as_number())
                else {
                    return Err(script_fault("repeat bounds must be numbers"));
                };
                if index > limit {
                    return Err(script_fault("repeat start is greater than its finish"));
                }
                while index <= limit {
                    self.parts
                        .get_mut(activation.part)?
                        .context
                        .set_local(variable, Value::Number(index));
                    match self.execute_stmts(activation, body)? {
                        ExecFlow::ExitRepeat => break,
                        ExecFlow::NextRepeat | ExecFlow::Normal => {}
                        flow @ (ExecFlow::ExitHandler | ExecFlow::Pass) => return Ok(flow),
                    }
                    index += 1.0;
                }
                Ok(ExecFlow::Normal)
            }
        }
    }

    fn conditional_repeat(
        &mut self,
        activation: &mut Activation,
        condition: &Argument,
        body: &[Statement],
        run_while_true: bool,
    ) -> Exec<ExecFlow> {
        let mut iterations = 0usize;
        loop {
            let test = self
                .evaluate_argument(activation.part, condition)?
                .is_truthy();
            if test != run_while_true {
                return Ok(ExecFlow::Normal);
            }
            iterations += 1;
            if iterations > Self::REPEAT_ITERATION_LIMIT {
                return Err(script_fault("repeat exceeded the iteration limit"));
            }
            match self.execute_stmts(activation, body)? {
                ExecFlow::ExitRepeat => return Ok(ExecFlow::Normal),
                ExecFlow::NextRepeat | ExecFlow::Normal => {}
                flow @ (ExecFlow::ExitHandler | ExecFlow::Pass) => return Ok(flow),
            }
        }
    }

    /// Terminal resolver. Owns the built-in command set; everything it
    /// cannot handle becomes a MessageNotUnderstood broadcast, never
    /// an unwound error.
    fn resolve_at_root(&mut self, message: &Message, origin: PartId) -> Result<Delivery> {
        match message.kind {
            MessageKind::Error => {
                self.record_error_message(message);
                self.trace_dispatch(message, origin, "error-recorded");
                Ok(Delivery::Handled(Value::Null))
            }
            MessageKind::Compile => {
                let delivery = self.resolve_compile_message(message, origin)?;
                self.trace_dispatch(message, origin, "root-handled");
                Ok(delivery)
            }
            MessageKind::Command => match self.run_builtin(message, origin)? {
                Some(value) => {
                    self.trace_dispatch(message, origin, "root-handled");
                    Ok(Delivery::Handled(value))
                }
                None => self.message_not_understood(message, origin),
            },
            MessageKind::Function => self.message_not_understood(message, origin),
        }
    }

    pub(crate) fn builtin_arg(
        &mut self,
        message: &Message,
        origin: PartId,
        index: usize,
    ) -> Result<Value> {
        match message.args.get(index) {
            None => Ok(Value::Null),
            Some(Argument::Value(value)) => Ok(value.clone()),
            Some(Argument::Node(node)) => match self.evaluate_node(origin, node) {
                Ok(value) => Ok(value),
                Err(ExecFault::Hard(error)) => Err(error),
                Err(ExecFault::Script(fault)) => {
                    self.report_script_fault(message.kind, &message.senders, origin, fault)?;
                    Ok(Value::Null)
                }
            },
        }
    }

    fn sender_part(&self, message: &Message, origin: PartId) -> PartId {
        message
            .senders
            .last()
            .map(|sender| sender.id)
            .filter(|id| self.parts.contains(*id))
            .unwrap_or(origin)
    }

    fn run_builtin(&mut self, message: &Message, origin: PartId) -> Result<Option<Value>> {
        match normalize_name(&message.name).as_str() {
            "answer" => {
                let text = self.builtin_arg(message, origin, 0)?.to_string();
                self.answers.push(text);
                Ok(Some(Value::Null))
            }
            "putinto" => {
                let value = self.builtin_arg(message, origin, 0)?;
                let destination = self.builtin_arg(message, origin, 1)?.to_string();
                let global = self.builtin_arg(message, origin, 2)?.is_truthy();
                let writer = self.sender_part(message, origin);
                if global || !self.parts.get_mut(writer)?.context.set_local(&destination, value.clone())
                {
                    self.globals.insert(normalize_name(&destination), value);
                }
                Ok(Some(Value::Null))
            }
            "setproperty" => {
                let property = self.builtin_arg(message, origin, 0)?.to_string();
                let value = self.builtin_arg(message, origin, 1)?;
                let owner = match self.builtin_arg(message, origin, 2)?.as_part() {
                    Some(part) => part,
                    None => self.sender_part(message, origin),
                };
                self.set_property(owner, &property, value)?;
                Ok(Some(Value::Null))
            }
            "go to direction" => {
                let direction = self.builtin_arg(message, origin, 0)?.to_string();
                let object = self.builtin_arg(message, origin, 1)?.to_string();
                self.navigate_direction(&direction, &object, origin)?;
                Ok(Some(Value::Null))
            }
            "go to reference" => {
                let object = self.builtin_arg(message, origin, 0)?.to_string();
                let id = self.builtin_arg(message, origin, 1)?.as_number();
                self.navigate_reference(&object, id)?;
                Ok(Some(Value::Null))
            }
            "newmodel" => {
                let type_name = self.builtin_arg(message, origin, 0)?.to_string();
                let owner_arg = self.builtin_arg(message, origin, 1)?;
                Ok(Some(self.new_model(&type_name, owner_arg)?))
            }
            "deletemodel" => {
                let target = self.builtin_arg(message, origin, 0)?;
                self.delete_model(target)?;
                Ok(Some(Value::Null))
            }
            // The result lands in the sender's `it`, like any command.
            "loadresource" => {
                let name = self.builtin_arg(message, origin, 0)?.to_string();
                match self.resource(&name) {
                    Some(value) => Ok(Some(value)),
                    None => {
                        self.record_error_message(&Message::error(
                            "RuntimeError",
                            &format!("no resource named \"{name}\" is available"),
                        ));
                        Ok(Some(Value::Null))
                    }
                }
            }
            // Untrapped pointer events are swallowed so that plain
            // interface clicks never produce MessageNotUnderstood.
            "mouseup" | "mousedown" | "mouseenter" | "mouseleave" | "click" => {
                Ok(Some(Value::Null))
            }
            _ => Ok(None),
        }
    }

    fn message_not_understood(&mut self, message: &Message, origin: PartId) -> Result<Delivery> {
        let detail = format!(
            "no handler for {} \"{}\"",
            kind_word(message.kind),
            message.name
        );
        self.error_log.push(ErrorReport {
            name: "MessageNotUnderstood".to_string(),
            detail: detail.clone(),
        });
        let error = Message::error("MessageNotUnderstood", &detail);
        self.broadcast_error(&error, &message.senders, origin)?;
        self.trace_dispatch(message, origin, "not-understood");
        Ok(Delivery::NotUnderstood)
    }

    /// Deliver an error message back along the sender chain, most
    /// recent sender first. Listeners are matched directly; error
    /// delivery never delegates and never triggers further broadcasts.
    fn broadcast_error(
        &mut self,
        error: &Message,
        senders: &[SenderRef],
        origin: PartId,
    ) -> Result<()> {
        if self.in_error_broadcast {
            return Ok(());
        }
        self.in_error_broadcast = true;

        let mut targets: Vec<PartId> = senders.iter().rev().map(|sender| sender.id).collect();
        if targets.is_empty() {
            targets.push(origin);
        }
        let mut seen = Vec::new();

        let result: Result<()> = (|| {
            for target in targets {
                if seen.contains(&target) || !self.parts.contains(target) {
                    continue;
                }
                seen.push(target);
                let handler = self
                    .parts
                    .get(target)?
                    .handler(MessageKind::Error, &error.name)
                    .cloned();
                if let Some(def) = handler {
                    self.invoke_handler(target, &def, error)?;
                }
            }
            Ok(())
        })();

        self.in_error_broadcast = false;
        result
    }

    pub(crate) fn report_script_fault(
        &mut self,
        source: MessageKind,
        senders: &[SenderRef],
        origin: PartId,
        fault: ScriptFault,
    ) -> Result<()> {
        self.error_log.push(ErrorReport {
            name: "RuntimeError".to_string(),
            detail: fault.detail.clone(),
        });
        // A fault raised while already handling an error report stops
        // here; otherwise it would ping-pong between listeners.
        if source == MessageKind::Error {
            return Ok(());
        }
        let error = Message::error("RuntimeError", &fault.detail);
        self.broadcast_error(&error, senders, origin)
    }

    pub(crate) fn record_error_message(&mut self, message: &Message) {
        let detail = match message.args.first() {
            Some(Argument::Value(value)) => value.to_string(),
            _ => String::new(),
        };
        self.error_log.push(ErrorReport {
            name: message.name.clone(),
            detail,
        });
    }

    pub(crate) fn trace_dispatch(
        &mut self,
        message: &Message,
        target: PartId,
        outcome: &'static str,
    ) {
        if !self.trace.enabled {
            return;
        }
        self.trace.entries.push(TraceEntry {
            kind: message.kind,
            name: message.name.clone(),
            target,
            outcome,
        });
    }
}
