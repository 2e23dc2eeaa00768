#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let data = read_lock!(block.data);
///  println!("{}", data.len());
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().expect("Failed to acquire read lock")
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut data = write_lock!(block.data);
///  data[0] = 42;
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().expect("Failed to acquire write lock")
    };
}

/// Implements address-based equality between facade kinds.
///
/// Every listed type must provide `fn location(&self) -> Location`. Equality between two
/// facades never looks at their type view, only at where they point.
///
/// ```rust, ignore
///  location_eq!(Pointer => ArrayView, StructView);
/// ```
macro_rules! location_eq {
    ($($lhs:ty => $($rhs:ty),+);+ $(;)?) => {
        $($(
            impl PartialEq<$rhs> for $lhs {
                fn eq(&self, other: &$rhs) -> bool {
                    self.location() == other.location()
                }
            }
        )+)+
    };
}
