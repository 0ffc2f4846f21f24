use super::*;

#[test]
fn literal_arithmetic_matches_direct_evaluation() -> Result<()> {
    let (sys, button) = world_with_button()?;
    // (2 + 2) = 4 and (2 + 3) = 4, evaluated as interpreter nodes.
    let sum = |a: f64, b: f64| InterpreterNode::Arithmetic {
        op: ArithmeticOp::Add,
        operands: vec![
            Argument::Value(Value::Number(a)),
            Argument::Value(Value::Number(b)),
        ],
    };
    let compare = |node: InterpreterNode| InterpreterNode::Arithmetic {
        op: ArithmeticOp::Equal,
        operands: vec![Argument::Node(node), Argument::Value(Value::Number(4.0))],
    };

    match sys.evaluate_node(button, &compare(sum(2.0, 2.0))) {
        Ok(Value::Bool(true)) => {}
        other => panic!("expected (2+2)=4 to be true, got {other:?}"),
    }
    match sys.evaluate_node(button, &compare(sum(2.0, 3.0))) {
        Ok(Value::Bool(false)) => {}
        other => panic!("expected (2+3)=4 to be false, got {other:?}"),
    }
    Ok(())
}

#[test]
fn scripted_arithmetic_and_comparisons() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put (2 + 2) = 4 into yes\n\
         put (2 + 3) = 4 into no\n\
         put 2 + 3 * 4 into precedence\n\
         put -3 + 5 into negated\n\
         put 10 - 4 - 3 into leftward\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    assert_eq!(sys.local(button, "probe", "yes")?, Some(Value::Bool(true)));
    assert_eq!(sys.local(button, "probe", "no")?, Some(Value::Bool(false)));
    assert_eq!(
        sys.local(button, "probe", "precedence")?,
        Some(Value::Number(14.0))
    );
    assert_eq!(
        sys.local(button, "probe", "negated")?,
        Some(Value::Number(2.0))
    );
    assert_eq!(
        sys.local(button, "probe", "leftward")?,
        Some(Value::Number(3.0))
    );
    Ok(())
}

#[test]
fn concatenation_is_distinct_from_addition() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put \"an\" & \"swer\" into glued\n\
         put \"hello\" && \"world\" into spaced\n\
         put 1 & 2 into digits\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    assert_eq!(
        sys.local(button, "probe", "glued")?,
        Some(Value::text("answer"))
    );
    assert_eq!(
        sys.local(button, "probe", "spaced")?,
        Some(Value::text("hello world"))
    );
    assert_eq!(
        sys.local(button, "probe", "digits")?,
        Some(Value::text("12"))
    );
    Ok(())
}

#[test]
fn text_comparison_is_normalized() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put \"Apple\" = \"apple\" into same\n\
         put \"apple\" != \"pear\" into different\n\
         put \"5\" = 5 into coerced\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    assert_eq!(sys.local(button, "probe", "same")?, Some(Value::Bool(true)));
    assert_eq!(
        sys.local(button, "probe", "different")?,
        Some(Value::Bool(true))
    );
    assert_eq!(
        sys.local(button, "probe", "coerced")?,
        Some(Value::Bool(true))
    );
    Ok(())
}

#[test]
fn is_and_is_not_read_as_equality() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put 3 is 3 into same\n\
         put 3 is not 4 into different\n\
         put \"on\" is \"off\" into words\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;

    assert_eq!(sys.local(button, "probe", "same")?, Some(Value::Bool(true)));
    assert_eq!(
        sys.local(button, "probe", "different")?,
        Some(Value::Bool(true))
    );
    assert_eq!(
        sys.local(button, "probe", "words")?,
        Some(Value::Bool(false))
    );
    Ok(())
}

#[test]
fn arithmetic_on_text_is_a_reported_fault() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put 1 + \"zzz\" into x\n\
         end probe",
        button,
    )?;
    let delivery = sys.send_command(button, "probe", Vec::new())?;

    // The fault is normalized to a reported error, never an unwound
    // call.
    assert_eq!(delivery, Delivery::Handled(Value::Null));
    assert!(
        sys.error_messages()
            .iter()
            .any(|report| report.name == "RuntimeError"),
        "expected a RuntimeError report, got {:?}",
        sys.error_messages()
    );
    Ok(())
}

#[test]
fn variable_read_without_context_is_a_fault() -> Result<()> {
    let (sys, button) = world_with_button()?;
    let node = InterpreterNode::Variable {
        name: "x".to_string(),
    };
    match sys.evaluate_node(button, &node) {
        Err(ExecFault::Script(_)) => Ok(()),
        other => panic!("expected a script fault, got {other:?}"),
    }
}

#[test]
fn unset_locals_read_as_null() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         put missing into x\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;
    assert_eq!(sys.local(button, "probe", "x")?, Some(Value::Null));
    Ok(())
}

#[test]
fn command_results_land_in_it() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on double n\n\
         return n * 2\n\
         end double\n\
         on probe\n\
         double 21\n\
         put it into result\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;
    assert_eq!(
        sys.local(button, "probe", "result")?,
        Some(Value::Number(42.0))
    );
    Ok(())
}

#[test]
fn function_handlers_return_values() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "function total(a, b)\n\
         return a + b\n\
         end total",
        button,
    )?;
    let delivery = sys.call_function(
        button,
        "total",
        vec![Value::Number(19.0), Value::Number(23.0)],
    )?;
    assert_eq!(delivery, Delivery::Handled(Value::Number(42.0)));
    Ok(())
}

#[test]
fn part_references_resolve_against_the_invoking_part() -> Result<()> {
    let (mut sys, _stack, card, _button) = world_with_parts()?;
    let ok_button = sys.add_part(PartKind::Button, card)?;
    sys.set_property_quiet(ok_button, "name", Value::text("Ok"))?;

    sys.compile(
        "on probe\n\
         set \"label\" to \"Found\" in button \"Ok\"\n\
         set \"name\" to \"Home\" in this card\n\
         end probe",
        card,
    )?;
    sys.send_command(card, "probe", Vec::new())?;

    assert_eq!(sys.get_property(ok_button, "label")?, Value::text("Found"));
    assert_eq!(sys.get_property(card, "name")?, Value::text("Home"));
    Ok(())
}

#[test]
fn this_type_mismatch_is_a_resolution_fault() -> Result<()> {
    let (mut sys, button) = world_with_button()?;
    sys.compile(
        "on probe\n\
         set \"name\" to \"x\" in this field\n\
         end probe",
        button,
    )?;
    sys.send_command(button, "probe", Vec::new())?;
    assert!(
        sys.error_messages()
            .iter()
            .any(|report| report.name == "RuntimeError" && report.detail.contains("field")),
        "expected a part resolution fault, got {:?}",
        sys.error_messages()
    );
    Ok(())
}
