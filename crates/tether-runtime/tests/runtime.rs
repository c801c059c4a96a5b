// Runtime states: pooling across threads, protected calls and config wiring

mod pool {
    use std::sync::Arc;
    use std::thread;
    use tether_runtime::{HostFunction, Module, State, StatePool, Value};

    fn module_state() -> State {
        let mut state = State::new();
        Module::new("math")
            .function("square", HostFunction::new(|x: f64| x * x))
            .register(&mut state);
        state
    }

    #[test]
    fn test_pool_shared_across_threads() {
        let pool = Arc::new(StatePool::new(module_state).with_max_idle(4));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut state = pool.acquire_guard();
                    let math = state.require("math").unwrap();
                    let square = math.as_table().unwrap().raw_get(&Value::from("square"));
                    let out = state.call(&square, &[Value::Number(i as f64)], 1).unwrap();
                    out[0].as_number().unwrap()
                })
            })
            .collect();

        let mut squares: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        squares.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(squares, vec![0.0, 1.0, 4.0, 9.0, 16.0, 25.0, 36.0, 49.0]);
        assert!(pool.idle_count() <= 4);

        pool.shutdown();
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_states_are_isolated() {
        let pool = StatePool::new(State::new);
        let mut a = pool.acquire();
        let b = pool.acquire();

        a.set_global("owner", Value::from("a"));
        assert_eq!(b.get_global("owner"), Value::Nil);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle_count(), 2);
    }
}

mod protected_calls {
    use tether_runtime::{CallParams, HostFunction, ScriptError, State, Value};

    #[test]
    fn test_host_panic_becomes_runtime_error() {
        let explode = HostFunction::new(|n: i64| -> i64 {
            if n > 0 {
                panic!("refusing {}", n);
            }
            n
        });

        let mut state = State::new();
        state.push(Value::from("keep me"));
        let err = state
            .call(&Value::Function(explode.to_script()), &[Value::Number(3.0)], 1)
            .unwrap_err();
        assert_eq!(err, ScriptError::runtime("refusing 3"));
        assert_eq!(state.top(), 1);
        assert_eq!(state.get(-1), Value::from("keep me"));
    }

    #[test]
    fn test_call_by_param_protected_error() {
        let mut state = State::new();
        let err = state
            .call_by_param(
                CallParams {
                    function: Value::Bool(true),
                    nret: 1,
                    protect: true,
                },
                &[],
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "attempt to call a boolean value");
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_call_by_param_pads_results() {
        let pair = HostFunction::new(|| ("left", "right"));
        let mut state = State::new();
        state
            .call_by_param(
                CallParams {
                    function: Value::Function(pair.to_script()),
                    nret: 3,
                    protect: true,
                },
                &[],
            )
            .unwrap();

        assert_eq!(state.top(), 3);
        assert_eq!(state.get(1), Value::from("left"));
        assert_eq!(state.get(2), Value::from("right"));
        assert_eq!(state.get(-1), Value::Nil);
        state.pop(3);
        assert_eq!(state.top(), 0);
    }
}

mod configured {
    use tether_config::{BridgeConfig, ConversionConfig, PoolConfig, RuntimeConfig};
    use tether_runtime::{ConversionError, HostFunction, State, StatePool, Table, Value};

    fn config() -> BridgeConfig {
        BridgeConfig {
            runtime: Some(RuntimeConfig {
                call_depth_limit: Some(16),
            }),
            pool: Some(PoolConfig { max_idle: Some(1) }),
            conversion: Some(ConversionConfig { max_depth: Some(2) }),
            logging: None,
        }
    }

    #[test]
    fn test_state_from_config() {
        let state = State::from_config(&config());
        assert_eq!(state.call_depth_limit(), 16);
        assert_eq!(state.converter().max_depth(), Some(2));
    }

    #[test]
    fn test_depth_limit_applies_to_arguments() {
        let deep = Table::new();
        let mid = Table::new();
        let leaf = Table::from_sequence([Value::Number(1.0)]);
        mid.raw_set_int(1, Value::Table(leaf));
        deep.raw_set_int(1, Value::Table(mid));

        let f = HostFunction::new(|_: tether_runtime::HostValue| ()).to_script_named("deep");
        let mut state = State::from_config(&config());
        let err = state
            .call(&Value::Function(f), &[Value::Table(deep)], 0)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "bad argument #1 to 'deep' ({})",
                ConversionError::DepthExceeded { limit: 2 }
            )
        );
    }

    #[test]
    fn test_pool_from_config_caps_idle() {
        let pool = StatePool::from_config(&config());
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(a.call_depth_limit(), 16);
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle_count(), 1);
    }
}
