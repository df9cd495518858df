//! Assertions over the result vectors returned by connections and RTMPT sessions

/// Asserts that a vector holds exactly one element per pattern, each matching its pattern (and
/// optional `if` guard) in order.
macro_rules! assert_vec_match {
    (@at $vector:ident, $index:expr) => {
        if $vector.len() != $index {
            panic!("Expected {} elements but found {}: {:?}", $index, $vector.len(), $vector);
        }
    };

    (@at $vector:ident, $index:expr,) => {
        assert_vec_match!(@at $vector, $index)
    };

    (@at $vector:ident, $index:expr, $pattern:pat $(if $guard:expr)? $(, $($rest:tt)*)?) => {
        if $vector.len() <= $index {
            panic!("Nothing at index {} to match against '{}'", $index, stringify!($pattern));
        }

        match $vector[$index] {
            $pattern $(if $guard)? => (),
            ref other => panic!("Index {} did not match '{}': {:?}", $index, stringify!($pattern), other),
        }

        assert_vec_match!(@at $vector, $index + 1usize $(, $($rest)*)?);
    };

    ($vector:expr $(, $($rest:tt)*)?) => {{
        let vector = &$vector;
        assert_vec_match!(@at vector, 0usize $(, $($rest)*)?);
    }};
}

/// Asserts that at least one element of a vector matches the pattern
macro_rules! assert_vec_contains {
    ($vector:expr, $pattern:pat $(if $guard:expr)?) => {{
        let vector = &$vector;
        let found = vector.iter().any(|item| match item {
            $pattern $(if $guard)? => true,
            _ => false,
        });

        if !found {
            panic!("No element matched '{}': {:?}", stringify!($pattern), vector);
        }
    }};
}
