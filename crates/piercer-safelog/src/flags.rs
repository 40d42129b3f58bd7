//! A dynamic switch for temporarily disabling redaction.

use fluid_let::fluid_let;

fluid_let!(
    /// A dynamic variable used to temporarily disable safe-logging.
    static SAFE_LOGGING_SUPPRESSED_IN_THREAD: bool
);

/// Returns true if we are displaying sensitive values, false otherwise.
pub(crate) fn unsafe_logging_enabled() -> bool {
    SAFE_LOGGING_SUPPRESSED_IN_THREAD.get(|v| v == Some(&true))
}

/// Run a given function with redaction suppressed.
///
/// The provided function, and everything it calls, will display
/// [`Sensitive`](crate::Sensitive) values as if they were not sensitive.
/// Intended for local, opt-in debug logging of request bodies and similar,
/// not for a global on/off switch.
///
/// # Examples
///
/// ```
/// use piercer_safelog::{Sensitive, with_safe_logging_suppressed};
///
/// let string = Sensitive::new("swordfish");
///
/// assert_eq!(format!("The value is {}", string),
///            "The value is [scrubbed]");
///
/// assert_eq!(
///     with_safe_logging_suppressed(|| format!("The value is {}", string)),
///     "The value is swordfish"
/// );
/// ```
pub fn with_safe_logging_suppressed<F, V>(func: F) -> V
where
    F: FnOnce() -> V,
{
    SAFE_LOGGING_SUPPRESSED_IN_THREAD.set(true, func)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn suppress_only_applies_within_the_closure() {
        assert!(!unsafe_logging_enabled());
        with_safe_logging_suppressed(|| assert!(unsafe_logging_enabled()));
        assert!(!unsafe_logging_enabled());
    }

    #[test]
    fn suppress_only_applies_to_the_current_thread() {
        use std::thread::spawn;

        let t = spawn(|| {
            assert!(!unsafe_logging_enabled());
            with_safe_logging_suppressed(|| assert!(unsafe_logging_enabled()));
        });
        with_safe_logging_suppressed(|| {
            t.join().unwrap();
        });
    }
}
