use super::*;

/// One handler invocation's variable scope: positional parameter
/// bindings plus locals.
#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    pub(crate) handler: String,
    pub(crate) parameters: Vec<(String, Value)>,
    pub(crate) locals: HashMap<String, Value>,
    pub(crate) result: Option<Value>,
}

impl Frame {
    fn new(handler: String, parameters: Vec<(String, Value)>) -> Self {
        Self {
            handler,
            parameters,
            locals: HashMap::new(),
            result: None,
        }
    }

    pub(crate) fn parameter(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index).map(|(_, value)| value)
    }

    pub(crate) fn local(&self, name: &str) -> Option<&Value> {
        let key = normalize_name(name);
        self.locals.get(&key).or_else(|| {
            self.parameters
                .iter()
                .find(|(param, _)| normalize_name(param) == key)
                .map(|(_, value)| value)
        })
    }

    pub(crate) fn set_local(&mut self, name: &str, value: Value) {
        self.locals.insert(normalize_name(name), value);
    }
}

/// Per-part execution scope. Frames are pushed on handler entry and
/// popped on exit, so recursive sends to the same handler name get
/// fresh locals; the most recently completed frame per handler name is
/// retained so locals stay inspectable after the run.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    stack: Vec<Frame>,
    finished: HashMap<String, Frame>,
}

impl ExecutionContext {
    /// Activate a fresh frame for the named handler at call entry.
    pub(crate) fn select(&mut self, handler: &str, parameters: Vec<(String, Value)>) {
        self.stack
            .push(Frame::new(normalize_name(handler), parameters));
    }

    /// Deactivate the current frame, retaining it for inspection.
    pub(crate) fn exit(&mut self) -> Option<Frame> {
        let frame = self.stack.pop()?;
        self.finished.insert(frame.handler.clone(), frame.clone());
        Some(frame)
    }

    pub(crate) fn active(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut Frame> {
        self.stack.last_mut()
    }

    /// Read a local (or bound parameter) off the active frame.
    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.active().and_then(|frame| frame.local(name))
    }

    /// Write a local on the active frame. Returns false when no frame
    /// is live.
    pub fn set_local(&mut self, name: &str, value: Value) -> bool {
        match self.active_mut() {
            Some(frame) => {
                frame.set_local(name, value);
                true
            }
            None => false,
        }
    }

    /// Live frame for the named handler if one is on the stack,
    /// otherwise the retained frame from its last completed run.
    pub(crate) fn frame_named(&self, handler: &str) -> Option<&Frame> {
        let key = normalize_name(handler);
        self.stack
            .iter()
            .rev()
            .find(|frame| frame.handler == key)
            .or_else(|| self.finished.get(&key))
    }
}
