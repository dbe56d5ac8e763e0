//! The [`Value`] trait: the seam through which host types enter the runtime.

/// A value that can be stored in a memory image.
///
/// The runtime needs three behaviors from every stored type — copy-construct
/// into fresh storage, copy-assign between live slots, and drop in place —
/// which it derives from the `Clone + 'static` bound when the type's
/// descriptor is created. A type that cannot be cloned cannot be declared;
/// this is enforced by the compiler, never checked at run time.
///
/// The two conversion hooks let generic callers inspect a variable whose
/// static type they do not know (diagnostic printing, numeric probes).
/// Both default to `None`; types opt in by overriding. Implementations are
/// provided for the primitive numeric types, `bool`, `char`, `String`, and
/// `&'static str`.
///
/// ```rust
/// use loam_core::Value;
///
/// #[derive(Clone)]
/// struct Temperature(f64);
///
/// impl Value for Temperature {
///     fn as_number(&self) -> Option<f64> {
///         Some(self.0)
///     }
/// }
/// ```
pub trait Value: Clone + 'static {
    /// A numeric view of this value, if the type has one.
    fn as_number(&self) -> Option<f64> {
        None
    }

    /// A textual view of this value, if the type has one.
    fn as_text(&self) -> Option<String> {
        None
    }
}

macro_rules! impl_numeric_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Value for $ty {
                fn as_number(&self) -> Option<f64> {
                    Some(*self as f64)
                }

                fn as_text(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

impl_numeric_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Value for bool {
    fn as_number(&self) -> Option<f64> {
        Some(if *self { 1.0 } else { 0.0 })
    }

    fn as_text(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl Value for char {
    fn as_text(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl Value for String {
    fn as_text(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl Value for &'static str {
    fn as_text(&self) -> Option<String> {
        Some((*self).to_string())
    }
}
