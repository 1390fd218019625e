pub use cook_derive::ObjectTraversal;
use std::collections::BTreeMap;

/// Visits every string reachable from a value, allowing the walker to rewrite it in place.
pub trait ObjectTraversal {
    fn traverse<T: ObjectWalker>(&mut self, walker: &mut T);
}

pub trait ObjectWalker {
    fn enter_string(&mut self, value: &mut String);
}

impl<T: ObjectTraversal> ObjectTraversal for Vec<T> {
    fn traverse<W: ObjectWalker>(&mut self, walker: &mut W) {
        for item in self {
            item.traverse(walker);
        }
    }
}

impl<T: ObjectTraversal> ObjectTraversal for Option<T> {
    fn traverse<W: ObjectWalker>(&mut self, walker: &mut W) {
        if let Some(v) = self {
            v.traverse(walker);
        }
    }
}

impl ObjectTraversal for String {
    fn traverse<W: ObjectWalker>(&mut self, walker: &mut W) {
        walker.enter_string(self);
    }
}

macro_rules! opaque_traversal {
    ($($ty:ty),*) => {
        $(
            impl ObjectTraversal for $ty {
                fn traverse<T: ObjectWalker>(&mut self, _: &mut T) {}
            }
        )*
    };
}

opaque_traversal!(bool, u16, u32, usize);

// Keys are left untouched: rewriting them could reorder or collide entries.
impl<K: Ord, V: ObjectTraversal> ObjectTraversal for BTreeMap<K, V> {
    fn traverse<T: ObjectWalker>(&mut self, walker: &mut T) {
        for value in self.values_mut() {
            value.traverse(walker);
        }
    }
}
