use super::*;

#[test]
fn unhandled_messages_produce_exactly_one_not_understood() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    let delivery = sys.send_command(button, "flub", Vec::new())?;
    assert_eq!(delivery, Delivery::NotUnderstood);
    assert_eq!(sys.not_understood().len(), 1);

    // A second miss is its own walk and its own report.
    sys.send_command(button, "flub", Vec::new())?;
    assert_eq!(sys.not_understood().len(), 2);
    Ok(())
}

#[test]
fn messages_delegate_up_the_ownership_chain() -> Result<()> {
    let (mut sys, stack, card, button) = world_with_parts()?;
    sys.compile(
        "on ping\n\
         answer \"stack got it\"\n\
         end ping",
        stack,
    )?;

    let delivery = sys.send_command(button, "ping", Vec::new())?;
    assert_eq!(delivery, Delivery::Handled(Value::Null));
    assert_eq!(sys.answers(), ["stack got it"]);

    // A nearer handler wins over the farther one.
    sys.compile(
        "on ping\n\
         answer \"card got it\"\n\
         end ping",
        card,
    )?;
    sys.send_command(button, "ping", Vec::new())?;
    assert_eq!(sys.answers(), ["stack got it", "card got it"]);
    Ok(())
}

#[test]
fn exit_ends_the_handler_without_delegating() -> Result<()> {
    let (mut sys, _stack, card, button) = world_with_parts()?;
    sys.compile(
        "on probe\n\
         put 1 into x\n\
         exit probe\n\
         put 2 into x\n\
         end probe",
        button,
    )?;
    sys.compile(
        "on probe\n\
         answer \"should not run\"\n\
         end probe",
        card,
    )?;

    sys.send_command(button, "probe", Vec::new())?;
    assert_eq!(sys.local(button, "probe", "x")?, Some(Value::Number(1.0)));
    assert!(sys.answers().is_empty());
    assert!(sys.not_understood().is_empty());
    Ok(())
}

#[test]
fn pass_runs_the_handler_and_still_delegates() -> Result<()> {
    let (mut sys, _stack, card, button) = world_with_parts()?;
    sys.compile(
        "on ping\n\
         put 1 into hits\n\
         pass ping\n\
         end ping",
        button,
    )?;
    sys.compile(
        "on ping\n\
         answer \"card\"\n\
         end ping",
        card,
    )?;

    let delivery = sys.send_command(button, "ping", Vec::new())?;
    assert_eq!(delivery, Delivery::Handled(Value::Null));
    assert_eq!(sys.local(button, "ping", "hits")?, Some(Value::Number(1.0)));
    assert_eq!(sys.answers(), ["card"]);
    Ok(())
}

#[test]
fn untrapped_pointer_events_are_swallowed_at_the_root() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    let delivery = sys.send_command(button, "mouseUp", Vec::new())?;
    assert_eq!(delivery, Delivery::Handled(Value::Null));
    assert!(sys.not_understood().is_empty());
    Ok(())
}

#[test]
fn recursive_sends_get_fresh_frames() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put 99 into x\n\
         countdown 3\n\
         put x into witness\n\
         end probe\n\
         on countdown n\n\
         put n into x\n\
         if n > 0\n\
         then countdown n - 1\n\
         end countdown",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    // The outer handler's local survives the recursion untouched.
    assert_eq!(
        sys.local(button, "probe", "witness")?,
        Some(Value::Number(99.0))
    );
    // The retained countdown frame is the outermost call, which
    // finished last.
    assert_eq!(
        sys.local(button, "countdown", "x")?,
        Some(Value::Number(3.0))
    );
    Ok(())
}

#[test]
fn runtime_faults_are_broadcast_to_listening_senders() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put 1 + \"zzz\" into x\n\
         end probe\n\
         on runtimeError detail\n\
         put detail into seen\n\
         end runtimeError",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    match sys.local(button, "runtimeError", "seen")? {
        Some(Value::Text(detail)) => {
            assert!(detail.contains("arithmetic"), "unexpected detail: {detail}")
        }
        other => panic!("expected the listener to see the fault, got {other:?}"),
    }
    Ok(())
}

#[test]
fn delegated_put_writes_the_executing_parts_frame() -> Result<()> {
    let (mut sys, _stack, card, button) = world_with_parts()?;
    sys.compile(
        "on ping\n\
         put 5 into y\n\
         end ping",
        card,
    )?;
    sys.send_command(button, "ping", Vec::new())?;
    assert_eq!(sys.local(card, "ping", "y")?, Some(Value::Number(5.0)));
    Ok(())
}

#[test]
fn load_resource_reads_the_system_registry() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.register_resource("greeting", Value::text("hello from outside"));
    sys.compile(
        "on probe\n\
         loadResource \"greeting\"\n\
         put it into fetched\n\
         loadResource \"missing\"\n\
         put it into absent\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    assert_eq!(
        sys.local(button, "probe", "fetched")?,
        Some(Value::text("hello from outside"))
    );
    assert_eq!(sys.local(button, "probe", "absent")?, Some(Value::Null));
    assert!(
        sys.error_messages()
            .iter()
            .any(|report| report.detail.contains("missing")),
        "expected a missing-resource report, got {:?}",
        sys.error_messages()
    );
    Ok(())
}

#[test]
fn deferred_commands_deliver_later_in_order() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on ping which\n\
         answer which\n\
         end ping",
        button,
    )?;
    sys.send_later(button, "ping", vec![Value::text("first")])?;
    sys.send_later(button, "ping", vec![Value::text("second")])?;
    assert!(sys.answers().is_empty());

    assert_eq!(sys.deliver_pending()?, 2);
    assert_eq!(sys.answers(), ["first", "second"]);
    Ok(())
}

#[test]
fn dispatch_trace_records_terminal_outcomes() -> Result<()> {
    let (mut sys, _stack, card, button) = world_with_parts()?;
    sys.enable_trace();
    sys.compile(
        "on ping\n\
         answer 1\n\
         end ping",
        card,
    )?;

    sys.send_command(button, "ping", Vec::new())?;
    sys.send_command(button, "flub", Vec::new())?;

    let outcomes: Vec<(&str, &str)> = sys
        .trace()
        .iter()
        .filter(|entry| entry.name == "ping" || entry.name == "flub")
        .map(|entry| (entry.name.as_str(), entry.outcome))
        .collect();
    assert!(outcomes.contains(&("ping", "handled")));
    assert!(outcomes.contains(&("flub", "not-understood")));
    Ok(())
}

#[test]
fn navigation_commands_update_the_current_registries() -> Result<()> {
    let mut sys = System::new();
    let stack = sys.add_part(PartKind::Stack, sys.world())?;
    let first = sys.add_part(PartKind::Card, stack)?;
    let second = sys.add_part(PartKind::Card, stack)?;
    let button = sys.add_part(PartKind::Button, first)?;
    assert_eq!(sys.current_card(), Some(first));

    sys.compile(
        "on probe\n\
         go to next card\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;
    assert_eq!(sys.current_card(), Some(second));

    // Wraps around the end of the stack.
    sys.send_command(button, "probe", Vec::new())?;
    assert_eq!(sys.current_card(), Some(first));
    Ok(())
}

#[test]
fn new_and_delete_model_commands_edit_the_tree() -> Result<()> {
    let (mut sys, _stack, card, button) = world_with_parts()?;
    sys.compile(
        "on probe\n\
         newModel \"field\"\n\
         put it into made\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    let made = match sys.local(button, "probe", "made")? {
        Some(Value::Part(id)) => id,
        other => panic!("expected a created part, got {other:?}"),
    };
    assert_eq!(sys.part_kind(made)?, PartKind::Field);
    assert_eq!(sys.owner(made)?, Some(card));

    sys.compile(
        &format!("on cleanup\ndeleteModel {made}\nend cleanup"),
        button,
    )?;
    sys.send_command(button, "cleanup", Vec::new())?;
    assert!(!sys.subparts(card)?.contains(&made));
    Ok(())
}
