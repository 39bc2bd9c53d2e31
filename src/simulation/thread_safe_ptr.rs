/// Raw pointer that can be shared between rayon workers.
///
/// Only used for scatter writes where every index is written by exactly one
/// worker (the index is claimed through an atomic counter beforehand).
#[derive(Copy, Clone)]
pub struct ThreadSafeMutPtr<T> {
    ptr: *mut T,
    len: usize,
}
unsafe impl<T> Sync for ThreadSafeMutPtr<T> {}
unsafe impl<T> Send for ThreadSafeMutPtr<T> {}
impl<T> ThreadSafeMutPtr<T> {
    pub fn new(slice: &mut [T]) -> ThreadSafeMutPtr<T> {
        ThreadSafeMutPtr {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    /// # Safety
    ///
    /// No other thread may access `idx` until the parallel pass is joined and
    /// the slice this pointer was created from must outlive the pass.
    pub unsafe fn write(&self, idx: usize, value: T) {
        assert!(idx < self.len, "scatter index {} out of bounds (len {})", idx, self.len);
        self.ptr.add(idx).write(value);
    }
}
