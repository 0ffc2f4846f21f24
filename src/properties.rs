use super::*;

/// Rewrites a CSS-like style string with one named styling value.
pub type Styler = fn(&str, &str, &Value) -> String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyVariant {
    Stored,
    Computed,
    Derived,
}

#[derive(Debug, Clone)]
pub(crate) enum PropertyKind {
    Stored { value: Value },
    Computed {
        get: fn(&Part) -> Value,
        set: Option<fn(&mut Part, &Value)>,
    },
    /// Styling value that is also pushed, through the table's styler,
    /// into the owner's stored `style` property on every set.
    Style { value: Value },
}

/// A named, aliasable value owned by one part. The first name is
/// primary; lookups accept the primary name or any alias.
#[derive(Debug, Clone)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) read_only: bool,
    pub(crate) kind: PropertyKind,
}

impl Property {
    pub(crate) fn stored(name: &str, aliases: &[&str], value: Value, read_only: bool) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            read_only,
            kind: PropertyKind::Stored { value },
        }
    }

    pub(crate) fn computed(
        name: &str,
        aliases: &[&str],
        get: fn(&Part) -> Value,
        set: Option<fn(&mut Part, &Value)>,
        read_only: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            read_only,
            kind: PropertyKind::Computed { get, set },
        }
    }

    pub(crate) fn style(name: &str, aliases: &[&str], value: Value) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            read_only: false,
            kind: PropertyKind::Style { value },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn variant(&self) -> PropertyVariant {
        match self.kind {
            PropertyKind::Stored { .. } => PropertyVariant::Stored,
            PropertyKind::Computed { .. } => PropertyVariant::Computed,
            PropertyKind::Style { .. } => PropertyVariant::Derived,
        }
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        let key = normalize_name(name);
        normalize_name(&self.name) == key
            || self.aliases.iter().any(|alias| normalize_name(alias) == key)
    }

    fn collides_with(&self, other: &Property) -> bool {
        other.matches(&self.name) || self.aliases.iter().any(|alias| other.matches(alias))
    }

    pub(crate) fn value(&self, owner: &Part) -> Value {
        match &self.kind {
            PropertyKind::Stored { value } | PropertyKind::Style { value } => value.clone(),
            PropertyKind::Computed { get, .. } => get(owner),
        }
    }
}

/// Ordered property list with linear name-or-alias lookup. Adding a
/// property whose name or alias collides with an existing one removes
/// the old property first.
#[derive(Debug)]
pub(crate) struct PropertyTable {
    properties: Vec<Property>,
    pub(crate) styler: Styler,
}

impl PropertyTable {
    pub(crate) fn new() -> Self {
        Self {
            properties: Vec::new(),
            styler: css_styler,
        }
    }

    pub(crate) fn add(&mut self, property: Property) {
        self.properties.retain(|existing| !property.collides_with(existing));
        self.properties.push(property);
    }

    pub(crate) fn find(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|prop| prop.matches(name))
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|prop| prop.matches(name))
    }

    pub(crate) fn at(&self, index: usize) -> &Property {
        &self.properties[index]
    }

    pub(crate) fn store_at(&mut self, index: usize, value: Value) {
        match &mut self.properties[index].kind {
            PropertyKind::Stored { value: slot } | PropertyKind::Style { value: slot } => {
                *slot = value;
            }
            PropertyKind::Computed { .. } => {}
        }
    }

    pub(crate) fn store_named(&mut self, name: &str, value: Value) {
        if let Some(index) = self.index_of(name) {
            self.store_at(index, value);
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.properties.iter().map(|prop| prop.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscriber {
    /// Notified with a `propertyChanged` command message.
    Part(PartId),
    /// Recorded in the system property-change log.
    System,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub part: PartId,
    pub name: String,
    pub value: Value,
}

fn id_get(part: &Part) -> Value {
    Value::Number(part.id.0 as f64)
}

fn type_get(part: &Part) -> Value {
    Value::text(part.kind.type_name())
}

fn events_get(part: &Part) -> Value {
    let mut names: Vec<&str> = part
        .command_handlers
        .values()
        .map(|def| def.name.as_str())
        .collect();
    names.sort_unstable();
    Value::text(names.join(", "))
}

/// Default property set shared by every part kind, plus per-kind
/// extras, in the order the authoring surface lists them.
pub(crate) fn install_defaults(part: &mut Part) {
    let table = &mut part.properties;
    table.add(Property::computed("id", &[], id_get, None, true));
    table.add(Property::computed("type", &[], type_get, None, true));
    table.add(Property::stored("name", &[], Value::text(""), false));
    table.add(Property::stored("script", &[], Value::text(""), false));
    table.add(Property::stored("style", &["cssStyle"], Value::text(""), false));
    table.add(Property::computed("events", &[], events_get, None, true));

    table.add(Property::style("top", &[], Value::Number(0.0)));
    table.add(Property::style("left", &[], Value::Number(0.0)));
    table.add(Property::style("width", &[], Value::Number(0.0)));
    table.add(Property::style("height", &[], Value::Number(0.0)));
    table.add(Property::style("background-color", &["backgroundColor"], Value::Null));
    table.add(Property::style("text-color", &["textColor"], Value::Null));
    table.add(Property::style("text-font", &["textFont"], Value::Null));
    table.add(Property::style("text-size", &["textSize"], Value::Null));

    match part.kind {
        PartKind::Button => {
            table.add(Property::stored("label", &[], Value::text(""), false));
        }
        PartKind::Field => {
            table.add(Property::stored("text", &["contents"], Value::text(""), false));
        }
        PartKind::World => {
            table.store_named("name", Value::text("World"));
        }
        _ => {}
    }
}

fn style_css_key(name: &str) -> &'static str {
    match normalize_name(name).as_str() {
        "top" => "top",
        "left" => "left",
        "width" => "width",
        "height" => "height",
        "background-color" => "background-color",
        "text-color" => "color",
        "text-font" => "font-family",
        "text-size" => "font-size",
        _ => "",
    }
}

fn style_css_value(name: &str, value: &Value) -> String {
    let pixel_sized = matches!(
        normalize_name(name).as_str(),
        "top" | "left" | "width" | "height" | "text-size"
    );
    match value {
        Value::Number(_) if pixel_sized => format!("{value}px"),
        other => other.to_string(),
    }
}

/// Default styler: upserts one declaration in a `key: value; …`
/// string, dropping the declaration when the value is null.
pub(crate) fn css_styler(current: &str, name: &str, value: &Value) -> String {
    let key = style_css_key(name);
    if key.is_empty() {
        return current.to_string();
    }

    let mut declarations: Vec<(String, String)> = current
        .split(';')
        .filter_map(|piece| {
            let (k, v) = piece.split_once(':')?;
            let (k, v) = (k.trim(), v.trim());
            if k.is_empty() { None } else { Some((k.to_string(), v.to_string())) }
        })
        .collect();

    declarations.retain(|(k, _)| k != key);
    if !value.is_null() {
        declarations.push((key.to_string(), style_css_value(name, value)));
    }

    declarations
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl System {
    /// Value of a property looked up by name or alias. A missing
    /// property is a hard error, not a message-routing outcome.
    pub fn get_property(&self, owner: PartId, name: &str) -> Result<Value> {
        let part = self.parts.get(owner)?;
        match part.properties.find(name) {
            Some(prop) => Ok(prop.value(part)),
            None => Err(Error::PropertyNotFound {
                part: owner,
                name: name.to_string(),
            }),
        }
    }

    pub fn set_property(&mut self, owner: PartId, name: &str, value: Value) -> Result<()> {
        self.set_property_with(owner, name, value, true)
    }

    pub fn set_property_quiet(&mut self, owner: PartId, name: &str, value: Value) -> Result<()> {
        self.set_property_with(owner, name, value, false)
    }

    pub(crate) fn set_property_with(
        &mut self,
        owner: PartId,
        name: &str,
        value: Value,
        notify: bool,
    ) -> Result<()> {
        enum Slot {
            ReadOnly,
            Stored(usize),
            Computed(fn(&mut Part, &Value)),
            Style(usize),
        }

        let (slot, primary) = {
            let part = self.parts.get(owner)?;
            let Some(index) = part.properties.index_of(name) else {
                return Err(Error::PropertyNotFound {
                    part: owner,
                    name: name.to_string(),
                });
            };
            let prop = part.properties.at(index);
            let slot = if prop.read_only {
                Slot::ReadOnly
            } else {
                match &prop.kind {
                    PropertyKind::Stored { .. } => Slot::Stored(index),
                    PropertyKind::Style { .. } => Slot::Style(index),
                    PropertyKind::Computed { set: Some(set), .. } => Slot::Computed(*set),
                    PropertyKind::Computed { set: None, .. } => Slot::ReadOnly,
                }
            };
            (slot, prop.name.clone())
        };

        match slot {
            // Read-only sets are a silent no-op: no error, no
            // notification.
            Slot::ReadOnly => return Ok(()),
            Slot::Stored(index) => {
                self.parts.get_mut(owner)?.properties.store_at(index, value.clone());
            }
            Slot::Computed(set) => {
                set(self.parts.get_mut(owner)?, &value);
            }
            Slot::Style(index) => {
                let part = self.parts.get_mut(owner)?;
                part.properties.store_at(index, value.clone());
                let styler = part.properties.styler;
                let current = match part.properties.find("style") {
                    Some(prop) => prop.value(part).to_string(),
                    None => String::new(),
                };
                let updated = styler(&current, &primary, &value);
                part.properties.store_named("style", Value::Text(updated));
            }
        }

        if notify {
            self.notify_property_changed(owner, &primary, value)?;
        }
        Ok(())
    }

    /// Probe for a property record without reading its value.
    pub fn find_property(&self, owner: PartId, name: &str) -> Result<Option<&Property>> {
        Ok(self.parts.get(owner)?.properties.find(name))
    }

    pub fn property_names(&self, owner: PartId) -> Result<Vec<String>> {
        Ok(self.parts.get(owner)?.properties.names())
    }

    /// Swap the styler used for this part's derived style properties.
    pub fn set_styler(&mut self, owner: PartId, styler: Styler) -> Result<()> {
        self.parts.get_mut(owner)?.properties.styler = styler;
        Ok(())
    }

    pub fn subscribe(&mut self, owner: PartId, subscriber: Subscriber) -> Result<()> {
        self.parts.get(owner)?;
        let entry = self.subscribers.entry(owner).or_default();
        if !entry.contains(&subscriber) {
            entry.push(subscriber);
        }
        Ok(())
    }

    pub fn unsubscribe(&mut self, owner: PartId, subscriber: Subscriber) {
        if let Some(entry) = self.subscribers.get_mut(&owner) {
            entry.retain(|existing| *existing != subscriber);
        }
    }

    fn notify_property_changed(&mut self, owner: PartId, name: &str, value: Value) -> Result<()> {
        // Snapshot: a subscriber reacting to the change may add or
        // remove subscriptions mid-notification.
        let snapshot = self.subscribers.get(&owner).cloned().unwrap_or_default();
        for subscriber in snapshot {
            match subscriber {
                Subscriber::System => self.property_log.push(PropertyChange {
                    part: owner,
                    name: name.to_string(),
                    value: value.clone(),
                }),
                Subscriber::Part(listener) => {
                    if !self.parts.contains(listener) {
                        continue;
                    }
                    let message = Message::command(
                        "propertyChanged",
                        vec![Value::text(name), value.clone(), Value::Part(owner)],
                    );
                    self.send_message(message, listener)?;
                }
            }
        }
        Ok(())
    }
}
