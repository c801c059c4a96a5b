//! Compile-time signatures for typed host functions
//!
//! `IntoHostFunction` is implemented for every `Fn(A1, ..., An) -> R` with
//! `n <= 8`, where each argument is `FromHost` and `R` is `IntoResults`. A
//! trailing [`Variadic<T>`] argument collects all remaining arguments.

use super::adapter::{CallFailure, HostFn};
use super::descriptor::{FunctionDescriptor, ParamType};
use crate::host::{FromHost, HostValue, IntoHost};
use std::fmt::Display;
use std::iter::Enumerate;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::vec::IntoIter;

/// Trailing argument that collects every remaining argument
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> Variadic<T> {
    pub fn new() -> Self {
        Variadic(Vec::new())
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Variadic<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> DerefMut for Variadic<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> FromIterator<T> for Variadic<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Variadic(iter.into_iter().collect())
    }
}

/// Values a host function hands back to the script
pub trait IntoResults {
    /// Encode into zero or more host values; `Err` is a host failure message
    fn into_results(self) -> Result<Vec<HostValue>, String>;

    fn return_types() -> Vec<ParamType>;
}

impl IntoResults for () {
    fn into_results(self) -> Result<Vec<HostValue>, String> {
        Ok(Vec::new())
    }

    fn return_types() -> Vec<ParamType> {
        Vec::new()
    }
}

impl<T: IntoHost> IntoResults for T {
    fn into_results(self) -> Result<Vec<HostValue>, String> {
        Ok(vec![self.into_host()])
    }

    fn return_types() -> Vec<ParamType> {
        vec![T::host_type()]
    }
}

impl<R: IntoResults, E: Display> IntoResults for Result<R, E> {
    fn into_results(self) -> Result<Vec<HostValue>, String> {
        match self {
            Ok(results) => results.into_results(),
            Err(e) => Err(e.to_string()),
        }
    }

    fn return_types() -> Vec<ParamType> {
        R::return_types()
    }
}

macro_rules! impl_tuple_results {
    ($($name:ident),+) => {
        impl<$($name: IntoHost),+> IntoResults for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_results(self) -> Result<Vec<HostValue>, String> {
                let ($($name,)+) = self;
                Ok(vec![$($name.into_host()),+])
            }

            fn return_types() -> Vec<ParamType> {
                vec![$($name::host_type()),+]
            }
        }
    };
}

impl_tuple_results!(A);
impl_tuple_results!(A, B);
impl_tuple_results!(A, B, C);
impl_tuple_results!(A, B, C, D);
impl_tuple_results!(A, B, C, D, E);
impl_tuple_results!(A, B, C, D, E, F);
impl_tuple_results!(A, B, C, D, E, F, G);
impl_tuple_results!(A, B, C, D, E, F, G, H);

/// A Rust function usable as a host function
///
/// `Args` is the argument tuple; it only exists to keep the impls apart.
pub trait IntoHostFunction<Args>: Send + Sync + 'static {
    fn descriptor() -> FunctionDescriptor;

    /// Type-erased body; callers check the argument count against
    /// [`descriptor`](Self::descriptor) first, as [`HostFunction`] does
    ///
    /// [`HostFunction`]: super::HostFunction
    fn into_body(self) -> Arc<HostFn>;
}

type Args = Enumerate<IntoIter<HostValue>>;

/// Coerce the next argument; positions are 1-based
fn next_arg<T: FromHost>(args: &mut Args) -> Result<T, CallFailure> {
    match args.next() {
        Some((index, value)) => T::from_host(value).map_err(|error| CallFailure::Argument {
            position: index + 1,
            error,
        }),
        None => unreachable!("argument count is checked against the descriptor before the body runs"),
    }
}

fn rest_args<T: FromHost>(args: Args) -> Result<Variadic<T>, CallFailure> {
    args.map(|(index, value)| {
        T::from_host(value).map_err(|error| CallFailure::Argument {
            position: index + 1,
            error,
        })
    })
    .collect()
}

macro_rules! impl_host_function {
    ($($arg:ident),*) => {
        impl<Func, Ret, $($arg,)*> IntoHostFunction<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: IntoResults,
            $($arg: FromHost,)*
        {
            fn descriptor() -> FunctionDescriptor {
                FunctionDescriptor::new(vec![$($arg::param_type()),*], Ret::return_types())
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_body(self) -> Arc<HostFn> {
                Arc::new(move |args: Vec<HostValue>| {
                    let mut args = args.into_iter().enumerate();
                    $(let $arg: $arg = next_arg(&mut args)?;)*
                    (self)($($arg),*).into_results().map_err(CallFailure::Host)
                })
            }
        }

        impl<Func, Ret, $($arg,)* Rest> IntoHostFunction<($($arg,)* Variadic<Rest>,)> for Func
        where
            Func: Fn($($arg,)* Variadic<Rest>) -> Ret + Send + Sync + 'static,
            Ret: IntoResults,
            $($arg: FromHost,)*
            Rest: FromHost,
        {
            fn descriptor() -> FunctionDescriptor {
                FunctionDescriptor::variadic(
                    vec![$($arg::param_type()),*],
                    Rest::param_type(),
                    Ret::return_types(),
                )
            }

            #[allow(non_snake_case, unused_mut)]
            fn into_body(self) -> Arc<HostFn> {
                Arc::new(move |args: Vec<HostValue>| {
                    let mut args = args.into_iter().enumerate();
                    $(let $arg: $arg = next_arg(&mut args)?;)*
                    let rest: Variadic<Rest> = rest_args(args)?;
                    (self)($($arg,)* rest).into_results().map_err(CallFailure::Host)
                })
            }
        }
    };
}

impl_host_function!();
impl_host_function!(A1);
impl_host_function!(A1, A2);
impl_host_function!(A1, A2, A3);
impl_host_function!(A1, A2, A3, A4);
impl_host_function!(A1, A2, A3, A4, A5);
impl_host_function!(A1, A2, A3, A4, A5, A6);
impl_host_function!(A1, A2, A3, A4, A5, A6, A7);

// Eight fixed arguments; a variadic tail would make nine
impl<Func, Ret, A1, A2, A3, A4, A5, A6, A7, A8> IntoHostFunction<(A1, A2, A3, A4, A5, A6, A7, A8)>
    for Func
where
    Func: Fn(A1, A2, A3, A4, A5, A6, A7, A8) -> Ret + Send + Sync + 'static,
    Ret: IntoResults,
    A1: FromHost,
    A2: FromHost,
    A3: FromHost,
    A4: FromHost,
    A5: FromHost,
    A6: FromHost,
    A7: FromHost,
    A8: FromHost,
{
    fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(
            vec![
                A1::param_type(),
                A2::param_type(),
                A3::param_type(),
                A4::param_type(),
                A5::param_type(),
                A6::param_type(),
                A7::param_type(),
                A8::param_type(),
            ],
            Ret::return_types(),
        )
    }

    fn into_body(self) -> Arc<HostFn> {
        Arc::new(move |args: Vec<HostValue>| {
            let mut args = args.into_iter().enumerate();
            (self)(
                next_arg(&mut args)?,
                next_arg(&mut args)?,
                next_arg(&mut args)?,
                next_arg(&mut args)?,
                next_arg(&mut args)?,
                next_arg(&mut args)?,
                next_arg(&mut args)?,
                next_arg(&mut args)?,
            )
            .into_results()
            .map_err(CallFailure::Host)
        })
    }
}
