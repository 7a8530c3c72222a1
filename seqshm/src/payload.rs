//! Types that may live inside a shared memory segment

/// Plain data that can be copied byte-wise into and out of shared memory.
///
/// # Safety
///
/// Implementors must guarantee that the type:
/// - contains no pointers, references, or handles that are only meaningful
///   inside one process
/// - accepts every bit pattern as a valid value, including all zeroes
///   (a freshly created segment is zero-filled)
/// - has the same layout in every process attaching to the segment
///   (`#[repr(C)]` or a primitive)
///
/// ```rust
/// use seqshm::ShmPayload;
///
/// #[derive(Clone, Copy)]
/// #[repr(C)]
/// struct GpsFix {
///     lat: f64,
///     lon: f64,
///     fix_quality: u32,
///     satellites: u32,
/// }
///
/// unsafe impl ShmPayload for GpsFix {}
/// ```
pub unsafe trait ShmPayload: Copy + Send + Sync + 'static {}

macro_rules! impl_payload {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl ShmPayload for $t {})*
    };
}

impl_payload!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: ShmPayload, const N: usize> ShmPayload for [T; N] {}
