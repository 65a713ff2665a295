//! Macros for terse handler registration.

/// Build an action extractor from a pattern.
///
/// `action_of!(Pattern => value)` yields `Some(value)` for matching actions;
/// `action_of!(Pattern)` yields `Some(())`. Everything else maps to `None`.
///
/// # Example
///
/// ```
/// use flowstate::action_of;
///
/// #[derive(Clone, Debug)]
/// enum Input {
///     Open(u32),
///     Close,
/// }
///
/// let open = action_of!(Input::Open(id) => *id);
/// let close = action_of!(Input::Close);
///
/// assert_eq!(open(&Input::Open(3)), Some(3));
/// assert_eq!(open(&Input::Close), None);
/// assert_eq!(close(&Input::Close), Some(()));
/// ```
#[macro_export]
macro_rules! action_of {
    ($pattern:pat => $value:expr) => {
        |action: &_| match action {
            $pattern => ::std::option::Option::Some($value),
            #[allow(unreachable_patterns)]
            _ => ::std::option::Option::None,
        }
    };
    ($pattern:pat) => {
        |action: &_| match action {
            $pattern => ::std::option::Option::Some(()),
            #[allow(unreachable_patterns)]
            _ => ::std::option::Option::None,
        }
    };
}
