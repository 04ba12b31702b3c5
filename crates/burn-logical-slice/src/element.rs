use burn_tensor::DType;
use half::{bf16, f16};

/// Element types the slice kernels are instantiated for.
///
/// The set is closed: every kernel is monomorphized per element type, and the runtime
/// [`DType`] tag selects among them.
pub trait SliceElement: Copy + Default + PartialEq + core::fmt::Debug + Send + Sync + 'static {
    /// Data type tag of the element.
    const DTYPE: DType;

    /// Combines two partial values of a partial-sum tensor.
    fn accumulate(self, other: Self) -> Self;

    /// Width of one element in bytes.
    fn byte_size() -> usize {
        core::mem::size_of::<Self>()
    }
}

macro_rules! impl_numeric_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl SliceElement for $ty {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn accumulate(self, other: Self) -> Self {
                    self + other
                }
            }
        )*
    };
}

impl_numeric_element!(
    f64 => F64,
    f32 => F32,
    f16 => F16,
    bf16 => BF16,
    i64 => I64,
    i32 => I32,
    i8 => I8,
    u8 => U8,
);

impl SliceElement for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self | other
    }
}
