use num_complex::{Complex32, Complex64};

/// Marker trait for types that may travel through a pipe.
///
/// A pipe's token type is fixed at compile time by type inference; the
/// runtime only needs tokens to be plain-old-data so ring slots can be
/// bulk-copied without drop obligations.
pub trait Token: Copy + Send + Sync + 'static {
    /// Short type name used in diagnostics.
    const NAME: &'static str;
}

impl Token for i8 {
    const NAME: &'static str = "i8";
}

impl Token for i16 {
    const NAME: &'static str = "i16";
}

impl Token for i32 {
    const NAME: &'static str = "i32";
}

impl Token for f32 {
    const NAME: &'static str = "float";
}

impl Token for f64 {
    const NAME: &'static str = "double";
}

impl Token for Complex32 {
    const NAME: &'static str = "cfloat";
}

impl Token for Complex64 {
    const NAME: &'static str = "cdouble";
}
