use super::*;

mod dispatch_and_delegation;
mod language_core_expressions;

fn world_with_parts() -> Result<(System, PartId, PartId, PartId)> {
    let mut sys = System::new();
    let stack = sys.add_part(PartKind::Stack, sys.world())?;
    let card = sys.add_part(PartKind::Card, stack)?;
    let button = sys.add_part(PartKind::Button, card)?;
    Ok((sys, stack, card, button))
}

fn world_with_button() -> Result<(System, PartId)> {
    let (sys, _, _, button) = world_with_parts()?;
    Ok((sys, button))
}
