use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub name: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub kind: MessageKind,
    pub name: String,
    pub target: PartId,
    pub outcome: &'static str,
}

#[derive(Debug, Default)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) entries: Vec<TraceEntry>,
}

/// The top of the system: owns the part tree, acts as the terminal
/// resolver of the delegation chain, and keeps the registries the
/// runtime and its observers read. One explicitly constructed value,
/// alive for the lifetime of the application.
#[derive(Debug)]
pub struct System {
    pub(crate) parts: Parts,
    world: PartId,
    pub(crate) globals: HashMap<String, Value>,
    pub(crate) subscribers: HashMap<PartId, Vec<Subscriber>>,
    pub(crate) resources: HashMap<String, Value>,
    pub(crate) current_stack: Option<PartId>,
    pub(crate) current_card: Option<PartId>,
    pub(crate) answers: Vec<String>,
    pub(crate) property_log: Vec<PropertyChange>,
    pub(crate) error_log: Vec<ErrorReport>,
    pub(crate) pending: Vec<(PartId, Message)>,
    pub(crate) trace: TraceState,
    pub(crate) in_error_broadcast: bool,
}

impl System {
    pub fn new() -> Self {
        let mut parts = Parts::default();
        let world = parts.insert(PartKind::World, None);
        let mut system = Self {
            parts,
            world,
            globals: HashMap::new(),
            subscribers: HashMap::new(),
            resources: HashMap::new(),
            current_stack: None,
            current_card: None,
            answers: Vec::new(),
            property_log: Vec::new(),
            error_log: Vec::new(),
            pending: Vec::new(),
            trace: TraceState::default(),
            in_error_broadcast: false,
        };
        system.subscribers.insert(world, vec![Subscriber::System]);
        system
    }

    pub fn world(&self) -> PartId {
        self.world
    }

    /// Create a part under an owner. The system subscribes itself to
    /// every new part, so property changes always reach the system
    /// log.
    pub fn add_part(&mut self, kind: PartKind, owner: PartId) -> Result<PartId> {
        if kind == PartKind::World {
            return Err(Error::RootImmutable);
        }
        self.parts.get(owner)?;
        let id = self.parts.insert(kind, Some(owner));
        self.parts.get_mut(owner)?.subparts.push(id);
        self.subscribers.insert(id, vec![Subscriber::System]);

        match kind {
            PartKind::Stack if self.current_stack.is_none() => self.current_stack = Some(id),
            PartKind::Card if self.current_card.is_none() => self.current_card = Some(id),
            _ => {}
        }
        Ok(id)
    }

    /// Remove a part from its owner's subparts, destroying it and its
    /// subtree.
    pub fn remove_part(&mut self, id: PartId) -> Result<()> {
        if id == self.world {
            return Err(Error::RootImmutable);
        }
        let owner = self
            .parts
            .get(id)?
            .owner
            .ok_or(Error::UnknownPart(id))?;
        self.parts
            .get_mut(owner)?
            .subparts
            .retain(|sub| *sub != id);

        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            if let Ok(part) = self.parts.get(doomed[i]) {
                doomed.extend(part.subparts.iter().copied());
            }
            i += 1;
        }
        for dead in &doomed {
            self.parts.remove(*dead);
            self.subscribers.remove(dead);
            if self.current_stack == Some(*dead) {
                self.current_stack = None;
            }
            if self.current_card == Some(*dead) {
                self.current_card = None;
            }
        }
        for listeners in self.subscribers.values_mut() {
            listeners.retain(|sub| match sub {
                Subscriber::Part(part) => !doomed.contains(part),
                Subscriber::System => true,
            });
        }
        Ok(())
    }

    pub fn part_kind(&self, id: PartId) -> Result<PartKind> {
        Ok(self.parts.get(id)?.kind)
    }

    pub fn owner(&self, id: PartId) -> Result<Option<PartId>> {
        Ok(self.parts.get(id)?.owner)
    }

    pub fn subparts(&self, id: PartId) -> Result<Vec<PartId>> {
        Ok(self.parts.get(id)?.subparts.clone())
    }

    pub fn current_stack(&self) -> Option<PartId> {
        self.current_stack
    }

    pub fn current_card(&self) -> Option<PartId> {
        self.current_card
    }

    /// Installed command-handler names, sorted, as the authoring
    /// surface lists them.
    pub fn handlers(&self, id: PartId) -> Result<Vec<String>> {
        let part = self.parts.get(id)?;
        let mut names: Vec<String> = part
            .command_handlers
            .values()
            .map(|def| def.name.clone())
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    pub fn function_handlers(&self, id: PartId) -> Result<Vec<String>> {
        let part = self.parts.get(id)?;
        let mut names: Vec<String> = part
            .function_handlers
            .values()
            .map(|def| def.name.clone())
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    pub fn script(&self, id: PartId) -> Result<Option<String>> {
        Ok(self.parts.get(id)?.script.clone())
    }

    /// A handler local after (or during) a run, by handler name.
    pub fn local(&self, part: PartId, handler: &str, name: &str) -> Result<Option<Value>> {
        Ok(self
            .parts
            .get(part)?
            .context
            .frame_named(handler)
            .and_then(|frame| frame.local(name))
            .cloned())
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(&normalize_name(name)).cloned()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(normalize_name(name), value);
    }

    /// Globally available named resources, registered by the
    /// embedding application.
    pub fn register_resource(&mut self, name: &str, value: Value) {
        self.resources.insert(normalize_name(name), value);
    }

    pub fn resource(&self, name: &str) -> Option<Value> {
        self.resources.get(&normalize_name(name)).cloned()
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn property_changes(&self) -> &[PropertyChange] {
        &self.property_log
    }

    pub fn error_messages(&self) -> &[ErrorReport] {
        &self.error_log
    }

    pub fn not_understood(&self) -> Vec<&ErrorReport> {
        self.error_log
            .iter()
            .filter(|report| report.name == "MessageNotUnderstood")
            .collect()
    }

    pub fn enable_trace(&mut self) {
        self.trace.enabled = true;
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace.entries
    }

    /// Queue a fire-and-forget command for later delivery. External
    /// asynchronous effects model their follow-up messages this way
    /// instead of blocking the synchronous call chain.
    pub fn send_later(&mut self, target: PartId, name: &str, args: Vec<Value>) -> Result<()> {
        self.parts.get(target)?;
        self.pending.push((target, Message::command(name, args)));
        Ok(())
    }

    /// Deliver every queued message in order. Returns how many ran.
    pub fn deliver_pending(&mut self) -> Result<usize> {
        let mut delivered = 0;
        while !self.pending.is_empty() {
            let (target, message) = self.pending.remove(0);
            if !self.parts.contains(target) {
                continue;
            }
            self.send_message(message, target)?;
            delivered += 1;
        }
        Ok(delivered)
    }

    fn enclosing_stack(&self, part: PartId) -> Result<Option<PartId>> {
        let mut cursor = Some(part);
        while let Some(id) = cursor {
            let current = self.parts.get(id)?;
            if current.kind == PartKind::Stack {
                return Ok(Some(id));
            }
            cursor = current.owner;
        }
        Ok(None)
    }

    fn children_of_kind(&self, owner: PartId, kind: PartKind) -> Result<Vec<PartId>> {
        let mut found = Vec::new();
        for sub in &self.parts.get(owner)?.subparts {
            if self.parts.get(*sub)?.kind == kind {
                found.push(*sub);
            }
        }
        Ok(found)
    }

    /// `go to next|previous card|stack`. Wraps at either end; with no
    /// siblings to move to, navigation is a quiet no-op.
    pub(crate) fn navigate_direction(
        &mut self,
        direction: &str,
        object: &str,
        origin: PartId,
    ) -> Result<()> {
        let forward = normalize_name(direction) != "previous";
        match normalize_name(object).as_str() {
            "stack" => {
                let stacks = self.children_of_kind(self.world, PartKind::Stack)?;
                if stacks.is_empty() {
                    return Ok(());
                }
                let at = self
                    .current_stack
                    .and_then(|current| stacks.iter().position(|s| *s == current))
                    .unwrap_or(0);
                let next = Self::step(at, stacks.len(), forward);
                self.current_stack = Some(stacks[next]);
                self.current_card = self
                    .children_of_kind(stacks[next], PartKind::Card)?
                    .first()
                    .copied();
            }
            _ => {
                let stack = match self.current_stack {
                    Some(stack) => Some(stack),
                    None => self.enclosing_stack(origin)?,
                };
                let Some(stack) = stack else { return Ok(()) };
                let cards = self.children_of_kind(stack, PartKind::Card)?;
                if cards.is_empty() {
                    return Ok(());
                }
                let at = self
                    .current_card
                    .and_then(|current| cards.iter().position(|c| *c == current))
                    .unwrap_or(0);
                let next = Self::step(at, cards.len(), forward);
                self.current_card = Some(cards[next]);
            }
        }
        Ok(())
    }

    fn step(at: usize, len: usize, forward: bool) -> usize {
        if forward {
            (at + 1) % len
        } else {
            (at + len - 1) % len
        }
    }

    /// `go to card 3` / `go to stack 2` by part id.
    pub(crate) fn navigate_reference(&mut self, object: &str, id: Option<f64>) -> Result<()> {
        let Some(raw) = id.filter(|n| *n >= 0.0 && n.fract() == 0.0) else {
            self.record_error_message(&Message::error(
                "RuntimeError",
                &format!("\"go to {object}\" needs a part id"),
            ));
            return Ok(());
        };
        let target = PartId(raw as usize);
        let Some(kind) = PartKind::from_type_name(object) else {
            self.record_error_message(&Message::error(
                "RuntimeError",
                &format!("cannot go to a \"{object}\""),
            ));
            return Ok(());
        };
        if !self.parts.contains(target) || self.parts.get(target)?.kind != kind {
            self.record_error_message(&Message::error(
                "RuntimeError",
                &format!("no {kind} has id {target}"),
            ));
            return Ok(());
        }
        match kind {
            PartKind::Stack => {
                self.current_stack = Some(target);
                self.current_card = self
                    .children_of_kind(target, PartKind::Card)?
                    .first()
                    .copied();
            }
            PartKind::Card => {
                self.current_card = Some(target);
                self.current_stack = self.enclosing_stack(target)?;
            }
            other => {
                self.record_error_message(&Message::error(
                    "RuntimeError",
                    &format!("cannot go to a {other}"),
                ));
            }
        }
        Ok(())
    }

    /// `newModel` built-in: create a part under the named owner, the
    /// current card by default.
    pub(crate) fn new_model(&mut self, type_name: &str, owner_arg: Value) -> Result<Value> {
        let Some(kind) = PartKind::from_type_name(type_name) else {
            self.record_error_message(&Message::error(
                "RuntimeError",
                &format!("cannot create unknown part type \"{type_name}\""),
            ));
            return Ok(Value::Null);
        };
        let owner = match owner_arg {
            Value::Part(id) => id,
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => PartId(n as usize),
            _ => match kind {
                PartKind::Stack => self.world,
                PartKind::Card | PartKind::Background => {
                    match self.current_stack {
                        Some(stack) => stack,
                        None => self.world,
                    }
                }
                _ => match self.current_card {
                    Some(card) => card,
                    None => self.world,
                },
            },
        };
        match self.add_part(kind, owner) {
            Ok(id) => Ok(Value::Part(id)),
            Err(error) => {
                self.record_error_message(&Message::error("RuntimeError", &error.to_string()));
                Ok(Value::Null)
            }
        }
    }

    /// `deleteModel` built-in.
    pub(crate) fn delete_model(&mut self, target: Value) -> Result<()> {
        let id = match target {
            Value::Part(id) => Some(id),
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => Some(PartId(n as usize)),
            _ => None,
        };
        let Some(id) = id else {
            self.record_error_message(&Message::error(
                "RuntimeError",
                "deleteModel needs a part reference",
            ));
            return Ok(());
        };
        if let Err(error) = self.remove_part(id) {
            self.record_error_message(&Message::error("RuntimeError", &error.to_string()));
        }
        Ok(())
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}
