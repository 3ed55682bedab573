use crate::key::KeyCacheKey;
use crate::{Align, Window};

/// Keyboard input understood by a [`Window`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Key {
    Enter,
    Space,
    ArrowUp,
    ArrowDown,
    Home,
    End,
}

impl<K: KeyCacheKey> Window<K> {
    /// Handles a key press on the focused list.
    ///
    /// `Enter` and `Space` activate the selected row exactly like a click does. Arrow keys,
    /// `Home` and `End` move the selection and scroll it into view.
    ///
    /// Returns the activated index, if any.
    pub fn handle_key(&mut self, key: Key) -> Option<usize> {
        let count = self.count();
        match key {
            Key::Enter | Key::Space => self.selected().and_then(|i| self.activate(i)),
            Key::ArrowUp | Key::ArrowDown | Key::Home | Key::End => {
                if count == 0 {
                    return None;
                }
                let next = match (key, self.selected()) {
                    (Key::Home, _) | (Key::ArrowDown, None) => 0,
                    (Key::End, _) | (Key::ArrowUp, None) => count - 1,
                    (Key::ArrowDown, Some(i)) => (i + 1).min(count - 1),
                    (Key::ArrowUp, Some(i)) => i.saturating_sub(1),
                    _ => return None,
                };
                self.select(Some(next));
                self.scroll_to_index(next, Align::Auto);
                None
            }
        }
    }
}
