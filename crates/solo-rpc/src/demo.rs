//! Demonstration instrument served by the binary.
//!
//! A stand-in for real hardware: a handful of operations registered in a
//! [`MethodTable`] so the server can be exercised end to end.

use serde_json::{json, Value};
use solo_core::{InvokeError, MethodSignature, MethodTable};
use std::time::Duration;

/// Name reported by `identify`.
pub const INSTRUMENT_NAME: &str = "solo demo instrument";

/// Build the method table of the demo instrument.
pub fn instrument() -> MethodTable {
    let mut table = MethodTable::new();
    table
        .register(
            "add",
            MethodSignature::new().required("a").required("b"),
            |args| async move { add(args.get(0)?, args.get(1)?) },
        )
        .register(
            "divide",
            MethodSignature::new().required("a").required("b"),
            |args| async move {
                let a: f64 = args.get(0)?;
                let b: f64 = args.get(1)?;
                if b == 0.0 {
                    return Err(InvokeError::Failed("division by zero".into()));
                }
                Ok(json!(a / b))
            },
        )
        .register("raise_exception", MethodSignature::new(), |_args| async move {
            Err(InvokeError::Failed("division by zero".into()))
        })
        .register(
            "echo",
            MethodSignature::new().required("value"),
            |args| async move { args.get::<Value>(0) },
        )
        .register(
            "sleep",
            MethodSignature::new().required("seconds"),
            |args| async move {
                let seconds: f64 = args.get(0)?;
                let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
                    InvokeError::InvalidParams(
                        "seconds must be a non-negative number within range".into(),
                    )
                })?;
                tokio::time::sleep(duration).await;
                Ok(json!(seconds))
            },
        )
        .register("identify", MethodSignature::new(), |_args| async move {
            Ok(json!({
                "name": INSTRUMENT_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }))
        });
    table
}

/// Integer sum when both operands are integers, float sum otherwise.
fn add(a: Value, b: Value) -> Result<Value, InvokeError> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a
            .checked_add(b)
            .map(|sum| json!(sum))
            .ok_or_else(|| InvokeError::Failed("integer overflow".into()));
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => Ok(json!(a + b)),
        _ => Err(InvokeError::InvalidParams("add expects two numbers".into())),
    }
}
