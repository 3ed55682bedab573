/// Bound for item keys used by the measurement cache.
///
/// Measured sizes are stored by key rather than by index so they follow rows across
/// reloads and reordering.
#[doc(hidden)]
pub trait KeyCacheKey: core::hash::Hash + Eq {}
impl<K: core::hash::Hash + Eq> KeyCacheKey for K {}

pub(crate) type KeySizeMap<K> = std::collections::HashMap<K, u32>;
