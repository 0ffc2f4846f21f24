use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Installed { handlers: Vec<String> },
    Failed { error: String, detail: String },
}

/// Compile-phase failure, carried as a value. The compiler never lets
/// a malformed script unwind its caller.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompileFault {
    pub(crate) stage: CompileStage,
    pub(crate) detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompileStage {
    Grammar,
    Semantics,
}

impl CompileStage {
    pub(crate) fn error_name(self) -> &'static str {
        match self {
            Self::Grammar => "GrammarMatchError",
            Self::Semantics => "SemanticsMatchError",
        }
    }
}

impl System {
    /// Compile a script and install its handlers on the target.
    /// Compilation is atomic per attempt: a fault reports an error
    /// message through the dispatch protocol and leaves the target's
    /// handler tables untouched.
    pub fn compile(&mut self, script: &str, target: PartId) -> Result<CompileOutcome> {
        self.parts.get(target)?;
        match parser::parse_script(script) {
            Err(fault) => {
                let name = fault.stage.error_name();
                self.send_message(Message::error(name, &fault.detail), target)?;
                Ok(CompileOutcome::Failed {
                    error: name.to_string(),
                    detail: fault.detail,
                })
            }
            Ok(definitions) => {
                let handlers = definitions.iter().map(|def| def.name.clone()).collect();
                self.install_handlers(target, definitions, script)?;
                Ok(CompileOutcome::Installed { handlers })
            }
        }
    }

    fn install_handlers(
        &mut self,
        target: PartId,
        definitions: Vec<HandlerDefinition>,
        script: &str,
    ) -> Result<()> {
        let part = self.parts.get_mut(target)?;
        let new_keys: Vec<(HandlerKind, String)> = definitions
            .iter()
            .map(|def| (def.kind, def.key()))
            .collect();

        // Diff semantics: names installed by the previous compilation
        // but absent from this script are removed, so exactly the
        // current script's handlers remain installed.
        for (kind, key) in std::mem::take(&mut part.compiled) {
            if new_keys.iter().any(|(k, n)| *k == kind && *n == key) {
                continue;
            }
            match kind {
                HandlerKind::Command => part.command_handlers.remove(&key),
                HandlerKind::Function => part.function_handlers.remove(&key),
            };
        }

        for def in definitions {
            let key = def.key();
            match def.kind {
                HandlerKind::Command => part.command_handlers.insert(key, def),
                HandlerKind::Function => part.function_handlers.insert(key, def),
            };
        }

        part.compiled = new_keys;
        part.script = Some(script.to_string());
        part.properties.store_named("script", Value::text(script));
        Ok(())
    }

    /// A compile-kind message received by the terminal resolver:
    /// `args[0]` is the script, `args[1]` the target part. This is the
    /// same path script-driven recompilation takes.
    pub(crate) fn resolve_compile_message(
        &mut self,
        message: &Message,
        origin: PartId,
    ) -> Result<Delivery> {
        let script = self.builtin_arg(message, origin, 0)?.to_string();
        let target = match self.builtin_arg(message, origin, 1)? {
            Value::Part(id) => id,
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => PartId(n as usize),
            Value::Null => origin,
            other => {
                self.error_log.push(ErrorReport {
                    name: "RuntimeError".to_string(),
                    detail: format!("\"{other}\" does not name a compile target"),
                });
                return Ok(Delivery::Handled(Value::Null));
            }
        };
        if !self.parts.contains(target) {
            self.error_log.push(ErrorReport {
                name: "RuntimeError".to_string(),
                detail: format!("no part has id {target}"),
            });
            return Ok(Delivery::Handled(Value::Null));
        }
        self.compile(&script, target)?;
        Ok(Delivery::Handled(Value::Null))
    }
}
