use super::*;

mod cursor;
mod expr;
mod stmt;

pub(crate) use cursor::Cursor;

pub(crate) type Parse<T> = std::result::Result<T, CompileFault>;

/// Match a script against the handler-block grammar, then run the
/// semantic pass that turns each block into a handler definition.
/// Structural faults surface as grammar faults, statement-level faults
/// as semantics faults; neither unwinds.
pub(crate) fn parse_script(src: &str) -> Parse<Vec<HandlerDefinition>> {
    let blocks = stmt::match_handler_blocks(src)?;
    let mut definitions = Vec::with_capacity(blocks.len());
    for block in blocks {
        definitions.push(stmt::parse_handler_block(block)?);
    }
    Ok(definitions)
}
