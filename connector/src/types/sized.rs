/// Reports the size in bytes a value occupies once delivered.
pub trait SizeHint {
    /// Returns the size in bytes for this value.
    fn size_hint(&self) -> usize;
}

impl<T> SizeHint for [T]
where
    T: SizeHint,
{
    fn size_hint(&self) -> usize {
        self.iter().map(SizeHint::size_hint).sum()
    }
}
