//! Built-in formula functions, one module per family.

pub mod logical;
pub mod math;
pub mod statistical;
pub mod technical;
pub mod temporal;

use crate::domain::error::RuntimeError;
use crate::domain::registry::{Args, Family, FunctionDescriptor, FunctionRegistry, Param};
use crate::domain::series::Series;
use crate::domain::value::Output;

/// Registers the full built-in catalog and its aliases.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    technical::register(registry);
    math::register(registry);
    logical::register(registry);
    temporal::register(registry);
    statistical::register(registry);
}

/// Registers a single-output function.
fn define<F>(
    registry: &mut FunctionRegistry,
    name: &str,
    family: Family,
    params: Vec<Param>,
    description: &str,
    compute: F,
) where
    F: Fn(&Args) -> Result<Series, RuntimeError> + Send + Sync + 'static,
{
    let descriptor = FunctionDescriptor::new(name, family, params, move |args| {
        compute(args).map(Output::Single)
    })
    .describe(description);
    registry.register(name, descriptor);
}
