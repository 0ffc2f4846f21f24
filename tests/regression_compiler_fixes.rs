use cardscript::{CompileOutcome, Delivery, PartKind, Result, System, Value};

fn fixture() -> Result<(System, cardscript::PartId)> {
    let mut sys = System::new();
    let stack = sys.add_part(PartKind::Stack, sys.world())?;
    let card = sys.add_part(PartKind::Card, stack)?;
    let button = sys.add_part(PartKind::Button, card)?;
    Ok((sys, button))
}

#[test]
fn overlapping_recompiles_diff_the_handler_table() -> Result<()> {
    let (mut sys, button) = fixture()?;
    sys.compile(
        "on alpha\n\
         answer \"alpha\"\n\
         end alpha\n\
         on beta\n\
         answer \"old beta\"\n\
         end beta",
        button,
    )?;
    sys.compile(
        "on beta\n\
         answer \"new beta\"\n\
         end beta\n\
         on gamma\n\
         answer \"gamma\"\n\
         end gamma",
        button,
    )?;

    assert_eq!(sys.handlers(button)?, vec!["beta", "gamma"]);
    assert_eq!(
        sys.send_command(button, "alpha", Vec::new())?,
        Delivery::NotUnderstood
    );
    sys.send_command(button, "beta", Vec::new())?;
    assert_eq!(sys.answers(), ["new beta"]);
    Ok(())
}

#[test]
fn reserved_words_cannot_name_handlers() -> Result<()> {
    let (mut sys, button) = fixture()?;
    let outcome = sys.compile("on repeat\nend repeat", button)?;
    assert!(matches!(
        outcome,
        CompileOutcome::Failed { ref error, .. } if error == "GrammarMatchError"
    ));
    assert!(sys.handlers(button)?.is_empty());
    Ok(())
}

#[test]
fn comments_and_blank_lines_are_ignored() -> Result<()> {
    let (mut sys, button) = fixture()?;
    let outcome = sys.compile(
        "-- the probe handler\n\
         on probe -- takes no arguments\n\
         \n\
         put 1 into x -- start at one\n\
         \n\
         end probe",
        button,
    )?;
    assert!(matches!(outcome, CompileOutcome::Installed { .. }));
    sys.send_command(button, "probe", Vec::new())?;
    assert_eq!(sys.local(button, "probe", "x")?, Some(Value::Number(1.0)));
    Ok(())
}

#[test]
fn command_and_function_namespaces_are_separate() -> Result<()> {
    let (mut sys, button) = fixture()?;
    sys.compile(
        "on hello\n\
         answer \"cmd\"\n\
         end hello\n\
         function hello()\n\
         return \"fn\"\n\
         end hello",
        button,
    )?;

    sys.send_command(button, "hello", Vec::new())?;
    assert_eq!(sys.answers(), ["cmd"]);
    assert_eq!(
        sys.call_function(button, "hello", Vec::new())?,
        Delivery::Handled(Value::text("fn"))
    );
    Ok(())
}

#[test]
fn handler_names_match_case_insensitively() -> Result<()> {
    let (mut sys, button) = fixture()?;
    sys.compile(
        "on mouseUp\n\
         answer \"clicked\"\n\
         end mouseUp",
        button,
    )?;
    sys.send_command(button, "mouseup", Vec::new())?;
    sys.send_command(button, "MOUSEUP", Vec::new())?;
    assert_eq!(sys.answers(), ["clicked", "clicked"]);
    Ok(())
}

#[test]
fn failed_recompiles_keep_the_previous_handlers_running() -> Result<()> {
    let (mut sys, button) = fixture()?;
    sys.compile(
        "on probe\n\
         put 41 + 1 into x\n\
         end probe",
        button,
    )?;
    let outcome = sys.compile("on probe\nput into x\nend probe", button)?;
    assert!(matches!(outcome, CompileOutcome::Failed { .. }));

    sys.send_command(button, "probe", Vec::new())?;
    assert_eq!(sys.local(button, "probe", "x")?, Some(Value::Number(42.0)));
    Ok(())
}
