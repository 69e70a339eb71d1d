//! Merge trait for configuration layering.
//!
//! `other` takes precedence over `self`. For `Option`, `other` wins when it is
//! `Some`; otherwise `self` is kept.

use std::path::PathBuf;

pub trait Merge {
    fn merge(self, other: Self) -> Self;
}

macro_rules! replace_on_merge {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Merge for $ty {
                fn merge(self, other: Self) -> Self {
                    other
                }
            }
        )*
    };
}

replace_on_merge!(bool, String, PathBuf, crate::accessor::Notation);

impl<T: Merge> Merge for Option<T> {
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (None, b) => b,
            (a, None) => a,
        }
    }
}

impl<T> Merge for Vec<T> {
    /// Replaced wholesale, never appended.
    fn merge(self, other: Self) -> Self {
        other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_merge() {
        assert_eq!(None::<bool>.merge(Some(true)), Some(true));
        assert_eq!(Some(true).merge(None), Some(true));
        assert_eq!(Some(true).merge(Some(false)), Some(false));
    }

    #[test]
    fn test_optional_list_is_replaced() {
        let global = Some(vec![PathBuf::from("a.types")]);
        let project = Some(vec![PathBuf::from("b.types")]);
        assert_eq!(global.clone().merge(None), global);
        assert_eq!(global.merge(project.clone()), project);
    }
}
