use cardscript::{PartKind, System, Value};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;

/// Script lines drawn from valid fragments, misplaced fragments, and
/// plain junk. Any combination must produce a compile outcome or an
/// error report, never a panic.
fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("on probe".to_string()),
        Just("on probe a, b".to_string()),
        Just("function calc(a)".to_string()),
        Just("end probe".to_string()),
        Just("end calc".to_string()),
        Just("end repeat".to_string()),
        Just("put 1 into x".to_string()),
        Just("put x + 1 into x".to_string()),
        Just("put \"a\" && b into x".to_string()),
        Just("repeat for 2 times".to_string()),
        Just("repeat with i = 1 to 3".to_string()),
        Just("if x > 1 then put 2 into y".to_string()),
        Just("if x > 1".to_string()),
        Just("then put 2 into y".to_string()),
        Just("else put 3 into y".to_string()),
        Just("answer x & \"!\"".to_string()),
        Just("set \"name\" to x".to_string()),
        Just("set \"label\" to 1 in this button".to_string()),
        Just("exit probe".to_string()),
        Just("exit repeat".to_string()),
        Just("next repeat".to_string()),
        Just("pass probe".to_string()),
        Just("return x".to_string()),
        Just("go to next card".to_string()),
        Just("flub 1, 2".to_string()),
        proptest::string::string_regex("[a-z0-9 \"(),+*=<>&-]{0,32}").expect("junk regex"),
    ]
}

fn script_strategy() -> impl Strategy<Value = String> {
    vec(line_strategy(), 0..12).prop_map(|lines| lines.join("\n"))
}

fn compile_and_dispatch_never_panic(script: String) -> TestCaseResult {
    let outcome = std::panic::catch_unwind(move || {
        let mut sys = System::new();
        let stack = sys.add_part(PartKind::Stack, sys.world())?;
        let card = sys.add_part(PartKind::Card, stack)?;
        let button = sys.add_part(PartKind::Button, card)?;
        sys.compile(&script, button)?;
        sys.send_command(button, "probe", Vec::new())?;
        sys.call_function(button, "calc", vec![Value::Number(1.0)])?;
        cardscript::Result::Ok(())
    });
    prop_assert!(
        outcome.is_ok(),
        "compilation or dispatch panicked for a generated script"
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn generated_scripts_never_panic_the_runtime(script in script_strategy()) {
        compile_and_dispatch_never_panic(script)?;
    }
}
