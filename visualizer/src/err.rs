use std::fmt::{self, Debug, Display};

/// Prints the `Display` form when returned from `main`, which only uses `Debug`.
pub struct DebugFromDisplay<E>(E);

impl<E> From<E> for DebugFromDisplay<E> {
    fn from(e: E) -> Self {
        Self(e)
    }
}

impl<E: Display> Debug for DebugFromDisplay<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
