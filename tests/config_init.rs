// Runs in its own test binary: the configuration is process-wide and set once.

use std::sync::Arc;

use nightvm::{ChunkBuilder, Func, Opcode, RuntimeError, Value, VmConfig};

#[test]
fn init_once_and_limits_apply() {
    let config = VmConfig::from_toml_str("max_call_depth = 8\nmax_stack_size = 16\n").unwrap();
    nightvm::init(config.clone()).unwrap();
    assert!(matches!(
        nightvm::init(VmConfig::default()),
        Err(RuntimeError::AlreadyInitialized)
    ));
    assert_eq!(nightvm::config(), &config);

    // (fn loop [f] (f f)) invoked with itself never returns.
    let mut body = ChunkBuilder::new();
    body.emit_load_arg(0).emit_load_arg(0).emit_invoke(1).emit(Opcode::Ret);
    let looping = Value::from(Func::new(1, false, Arc::new(body.finish())));
    let err = looping.invoke(vec![looping.clone()]).unwrap_err();
    assert!(matches!(err, RuntimeError::CallDepthExceeded(8)));

    // The depth counter unwinds: a shallow call still works afterwards.
    let mut body = ChunkBuilder::new();
    body.emit_load_arg(0).emit(Opcode::Ret);
    let identity = Value::from(Func::new(1, false, Arc::new(body.finish())));
    assert_eq!(identity.invoke(vec![Value::Int(7)]).unwrap(), Value::Int(7));

    let mut wide = ChunkBuilder::new();
    for _ in 0..17 {
        wide.emit(Opcode::Nil);
    }
    wide.emit(Opcode::Ret);
    let err = nightvm::Runtime::default().run(&wide.finish()).unwrap_err();
    assert!(matches!(err, RuntimeError::StackOverflow(16)));
}
