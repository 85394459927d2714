//! Unwrapping that must be proven infallible at link time.

pub trait OptionalExt {
    type Value;

    /// Unwraps a value the optimizer can see is always present.
    ///
    /// If the failure path survives optimization, linking fails with a message naming this
    /// function instead of the firmware carrying a panic location and its formatting code.
    fn unwrap_infallible(self) -> Self::Value;
}

impl<T, E> OptionalExt for Result<T, E> {
    type Value = T;

    #[inline(always)]
    fn unwrap_infallible(self) -> T {
        match self {
            Ok(x) => x,
            Err(_) => not_infallible(),
        }
    }
}

impl<T> OptionalExt for Option<T> {
    type Value = T;

    #[inline(always)]
    fn unwrap_infallible(self) -> T {
        match self {
            Some(x) => x,
            None => not_infallible(),
        }
    }
}

#[inline(never)]
fn not_infallible() -> ! {
    extern "Rust" {
        #[link_name = "\n==========================================\nerror: unwrap_infallible() could be reached\n=========================================="]
        fn undefined() -> !;
    }

    // NOTE(unsafe): never linked, any call site left after optimization is a build error
    unsafe { undefined() }
}
