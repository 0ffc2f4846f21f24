use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(pub(crate) usize);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    World,
    Stack,
    Card,
    Background,
    Button,
    Field,
}

impl PartKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::World => "world",
            Self::Stack => "stack",
            Self::Card => "card",
            Self::Background => "background",
            Self::Button => "button",
            Self::Field => "field",
        }
    }

    pub(crate) fn from_type_name(name: &str) -> Option<Self> {
        match normalize_name(name).as_str() {
            "world" => Some(Self::World),
            "stack" => Some(Self::Stack),
            "card" => Some(Self::Card),
            "background" => Some(Self::Background),
            "button" => Some(Self::Button),
            "field" => Some(Self::Field),
            _ => None,
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One node in the scriptable object tree. Owner is a non-owning
/// back-reference; the arena owns every part.
#[derive(Debug)]
pub(crate) struct Part {
    pub(crate) id: PartId,
    pub(crate) kind: PartKind,
    pub(crate) owner: Option<PartId>,
    pub(crate) subparts: Vec<PartId>,
    pub(crate) properties: PropertyTable,
    pub(crate) command_handlers: HashMap<String, HandlerDefinition>,
    pub(crate) function_handlers: HashMap<String, HandlerDefinition>,
    /// Raw source of the most recent successful compilation.
    pub(crate) script: Option<String>,
    /// Handler keys installed by the most recent compilation, used to
    /// diff away handlers a recompile no longer defines.
    pub(crate) compiled: Vec<(HandlerKind, String)>,
    pub(crate) context: ExecutionContext,
}

impl Part {
    pub(crate) fn new(id: PartId, kind: PartKind, owner: Option<PartId>) -> Self {
        let mut part = Self {
            id,
            kind,
            owner,
            subparts: Vec::new(),
            properties: PropertyTable::new(),
            command_handlers: HashMap::new(),
            function_handlers: HashMap::new(),
            script: None,
            compiled: Vec::new(),
            context: ExecutionContext::default(),
        };
        properties::install_defaults(&mut part);
        part
    }

    /// Look up an installed handler for a message. Error messages are
    /// trappable by ordinary `on <errorName>` command handlers.
    pub(crate) fn handler(&self, kind: MessageKind, name: &str) -> Option<&HandlerDefinition> {
        let key = normalize_name(name);
        match kind {
            MessageKind::Command | MessageKind::Error => self.command_handlers.get(&key),
            MessageKind::Function => self.function_handlers.get(&key),
            MessageKind::Compile => None,
        }
    }

    pub(crate) fn sender_ref(&self) -> SenderRef {
        SenderRef {
            kind: self.kind,
            id: self.id,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Parts {
    slots: Vec<Option<Part>>,
}

impl Parts {
    pub(crate) fn insert(&mut self, kind: PartKind, owner: Option<PartId>) -> PartId {
        let id = PartId(self.slots.len());
        self.slots.push(Some(Part::new(id, kind, owner)));
        id
    }

    pub(crate) fn contains(&self, id: PartId) -> bool {
        self.slots.get(id.0).is_some_and(Option::is_some)
    }

    pub(crate) fn get(&self, id: PartId) -> Result<&Part> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownPart(id))
    }

    pub(crate) fn get_mut(&mut self, id: PartId) -> Result<&mut Part> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownPart(id))
    }

    pub(crate) fn remove(&mut self, id: PartId) -> Option<Part> {
        self.slots.get_mut(id.0).and_then(Option::take)
    }
}
