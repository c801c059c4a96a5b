// Host functions called from script context
//
// Arity rules for fixed and variadic signatures, argument errors, host
// failures and the module/require path end to end.

mod arity {
    use rstest::rstest;
    use tether_runtime::{CallFailure, HostFunction, ScriptError, State, Value, Variadic};

    fn numbers(n: usize) -> Vec<Value> {
        (1..=n).map(|i| Value::Number(i as f64)).collect()
    }

    #[rstest]
    #[case(1, false)]
    #[case(2, true)]
    #[case(3, false)]
    fn test_fixed_arity(#[case] given: usize, #[case] accepted: bool) {
        let pair = HostFunction::new(|a: i64, b: i64| a * 10 + b).to_script_named("pair");
        let mut state = State::new();

        let outcome = state.call(&Value::Function(pair), &numbers(given), 1);
        if accepted {
            assert_eq!(outcome.unwrap(), vec![Value::Number(12.0)]);
        } else {
            assert_eq!(
                outcome.unwrap_err(),
                ScriptError::Arity {
                    function: "pair".to_string(),
                    expected: 2,
                    actual: given,
                    variadic: false,
                }
            );
        }
    }

    #[rstest]
    #[case(0, None)]
    #[case(1, Some(0))]
    #[case(2, Some(1))]
    #[case(5, Some(4))]
    fn test_variadic_arity(#[case] given: usize, #[case] rest_len: Option<usize>) {
        let count = HostFunction::new(|_first: i64, rest: Variadic<i64>| rest.len() as i64)
            .to_script_named("count");
        let mut state = State::new();

        let outcome = state.call(&Value::Function(count), &numbers(given), 1);
        match rest_len {
            Some(n) => assert_eq!(outcome.unwrap(), vec![Value::Number(n as f64)]),
            None => {
                let err = outcome.unwrap_err();
                assert_eq!(
                    err.to_string(),
                    "Function 'count' expects at least 1 argument, got 0"
                );
            }
        }
    }

    #[test]
    fn test_variadic_tail_collects_the_rest() {
        let split = HostFunction::new(|a: i64, b: Variadic<i64>| (a, b.into_inner()));
        // Host-side calls follow the same arity rule
        assert_eq!(
            split.call(Vec::new()),
            Err(CallFailure::Arity {
                expected: 1,
                actual: 0,
                variadic: true,
            })
        );

        let mut state = State::new();
        let results = state
            .call(&Value::Function(split.to_script()), &numbers(4), 2)
            .unwrap();
        assert_eq!(results[0], Value::Number(1.0));
        let tail = results[1].as_table().unwrap();
        assert_eq!(tail.sequence_len(), Some(3));
        assert_eq!(tail.raw_get_int(1), Value::Number(2.0));
        assert_eq!(tail.raw_get_int(3), Value::Number(4.0));
    }
}

mod argument_errors {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tether_runtime::{HostFunction, ScriptError, State, Table, Value};

    #[test]
    fn test_bad_argument_names_position() {
        let repeat = HostFunction::new(|s: String, n: usize| s.repeat(n)).to_script_named("repeat");
        let mut state = State::new();

        let err = state
            .call(&Value::Function(repeat), &[Value::from("ab"), Value::Number(1.5)], 1)
            .unwrap_err();
        assert_eq!(
            err,
            ScriptError::Argument {
                function: "repeat".to_string(),
                position: 2,
                message: "cannot convert float 1.5 to uint".to_string(),
            }
        );
        assert!(err.is_argument_error());
    }

    #[test]
    fn test_body_does_not_run_on_bad_argument() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let f = HostFunction::new(move |_: i64, _: String| flag.store(true, Ordering::SeqCst));

        let mut state = State::new();
        let err = state
            .call(
                &Value::Function(f.to_script()),
                &[Value::from("not a number"), Value::from("ok")],
                0,
            )
            .unwrap_err();
        assert!(err.is_argument_error());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_script_function_argument_cannot_decode() {
        let f = HostFunction::new(|_: Option<i64>| ()).to_script_named("takes_value");
        let callee = Value::Function(HostFunction::new(|| ()).to_script());

        let mut state = State::new();
        let err = state.call(&Value::Function(f), &[callee], 0).unwrap_err();
        assert!(matches!(err, ScriptError::Argument { position: 1, .. }));
    }

    #[test]
    fn test_table_argument_of_wrong_shape() {
        let sum = HostFunction::new(|xs: Vec<f64>| xs.iter().sum::<f64>()).to_script_named("sum");
        let keyed = Table::new();
        keyed.raw_set(Value::from("a"), Value::Number(1.0)).unwrap();

        let mut state = State::new();
        let err = state
            .call(&Value::Function(sum), &[Value::Table(keyed)], 1)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'sum' (cannot convert map of 1 to [float])"
        );
    }
}

mod host_failures {
    use std::time::Duration;
    use tether_runtime::{
        CallFailure, ErrorKind, FunctionDescriptor, HostFunction, HostValue, ParamType,
        ScriptError, State, Value,
    };

    #[test]
    fn test_err_result_is_runtime_error() {
        let parse = HostFunction::new(|s: String| s.parse::<i64>().map_err(|e| e.to_string()));
        let mut state = State::new();

        let ok = state
            .call(&Value::Function(parse.to_script()), &[Value::from("17")], 1)
            .unwrap();
        assert_eq!(ok, vec![Value::Number(17.0)]);

        let err = state
            .call(&Value::Function(parse.to_script()), &[Value::from("x")], 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.to_string(), "invalid digit found in string");
    }

    #[test]
    fn test_unencodable_result_reports_attempted_count() {
        let leak = HostFunction::new(|| (1_i64, HostFunction::new(|| ()), Duration::from_secs(1)));
        let mut state = State::new();

        let err = state
            .call(&Value::Function(leak.to_script()), &[], 3)
            .unwrap_err();
        let ScriptError::Runtime { message, attempted } = err else {
            panic!("expected a runtime error");
        };
        assert_eq!(attempted, 3);
        assert!(message.starts_with("unknown type function"));
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_dynamic_function_coerces_declared_params() {
        let descriptor = FunctionDescriptor::new(vec![ParamType::Int], vec![ParamType::Int]);
        let double = HostFunction::dynamic(descriptor, |args: Vec<HostValue>| match &args[0] {
            HostValue::Int(n) => Ok(n * 2),
            other => Err(format!("unexpected {}", other.type_name())),
        });

        assert_eq!(
            double.call(vec![HostValue::Float(21.0)]).unwrap(),
            vec![HostValue::Int(42)]
        );
        assert!(matches!(
            double.call(vec![HostValue::Float(0.5)]),
            Err(CallFailure::Argument { position: 1, .. })
        ));
    }
}

mod modules {
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tether_runtime::{HostFunction, HostValue, IntoHost, Module, State, Value};

    fn foo_bar(a: i64, b: i64, c: HashMap<String, String>) -> (String, String, Vec<HostValue>) {
        (
            "foo".to_string(),
            "bar".to_string(),
            vec![a.into_host(), b.into_host(), c.into_host()],
        )
    }

    #[test]
    fn test_foo_bar_through_require() {
        let mut state = State::new();
        Module::new("mymodule")
            .function("foo_bar", HostFunction::new(foo_bar))
            .register(&mut state);

        let require = state.get_global("require");
        let module = state.call(&require, &[Value::from("mymodule")], 1).unwrap();
        let foo_bar = module[0].as_table().unwrap().raw_get(&Value::from("foo_bar"));

        let arg = tether_runtime::to_script(HashMap::from([("x", "y")])).unwrap();
        let results = state
            .call(&foo_bar, &[Value::Number(1.0), Value::Number(2.0), arg], 3)
            .unwrap();

        assert_eq!(results[0], Value::from("foo"));
        assert_eq!(results[1], Value::from("bar"));

        let list = results[2].as_table().unwrap();
        assert_eq!(list.sequence_len(), Some(3));
        assert_eq!(list.raw_get_int(1), Value::Number(1.0));
        assert_eq!(list.raw_get_int(2), Value::Number(2.0));
        let inner = list.raw_get_int(3);
        assert_eq!(
            inner.as_table().unwrap().raw_get(&Value::from("x")),
            Value::from("y")
        );
    }

    #[test]
    fn test_optional_list_passes_between_host_functions() {
        let mut state = State::new();
        Module::new("lists")
            .function("produce", HostFunction::new(|| vec![Some(1_i64), None, Some(3)]))
            .function(
                "consume",
                HostFunction::new(|xs: Vec<Option<i64>>| {
                    (xs.len() as i64, xs.iter().flatten().sum::<i64>())
                }),
            )
            .register(&mut state);

        let lists = state.require("lists").unwrap();
        let lists = lists.as_table().unwrap();
        let produced = state.call(&lists.raw_get_str("produce"), &[], 1).unwrap();
        let consumed = state
            .call(&lists.raw_get_str("consume"), &produced, 2)
            .unwrap();
        assert_eq!(consumed, vec![Value::Number(3.0), Value::Number(4.0)]);
    }

    #[test]
    fn test_descriptor_of_registered_function() {
        let f = HostFunction::new(foo_bar);
        assert_eq!(
            f.descriptor().to_string(),
            "fn(int, int, {string: string}) -> (string, string, [any])"
        );
    }

    #[test]
    fn test_missing_module() {
        let mut state = State::new();
        let require = state.get_global("require");
        let err = state.call(&require, &[Value::from("nope")], 1).unwrap_err();
        assert_eq!(err.to_string(), "module 'nope' not found");
    }
}
