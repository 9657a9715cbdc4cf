//! `SpaceUsage`: reports the byte footprint of build-time structures, the
//! way the teacher's `SpaceUsage` trait does for `InvertedIndex`/`PostingList`.

pub trait SpaceUsage {
    fn space_usage_byte(&self) -> usize;
}

impl<T> SpaceUsage for [T] {
    fn space_usage_byte(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

impl<T> SpaceUsage for Box<[T]> {
    fn space_usage_byte(&self) -> usize {
        std::mem::size_of_val(self.as_ref())
    }
}

impl<T> SpaceUsage for Vec<T> {
    fn space_usage_byte(&self) -> usize {
        self.capacity() * std::mem::size_of::<T>()
    }
}
