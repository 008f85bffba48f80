use crate::settings::{FontSettings, Generation};
use crate::shaped::FontFaceId;

/// A concrete face handle plus the em size glyphs were shaped at.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FontFace {
    pub id: FontFaceId,
    pub em_size: f32,
}

/// Font resolution backend. Given the active font settings and the
/// (bold, italic) attribute pair, returns a concrete face handle and
/// its em size. Enumeration and fallback are the backend's business;
/// the core only caches the result.
pub trait FontResolver {
    fn resolve(&mut self, settings: &FontSettings, bold: bool, italic: bool) -> FontFace;
}

/// Caches the four (bold, italic) face combinations. Invalidated
/// only when the font section's generation changes.
#[derive(Default)]
pub struct FaceCache {
    faces: [[Option<FontFace>; 2]; 2],
    generation: Generation,
}

impl FaceCache {
    pub fn get(
        &mut self,
        resolver: &mut dyn FontResolver,
        settings: &FontSettings,
        bold: bool,
        italic: bool,
    ) -> FontFace {
        let slot = &mut self.faces[bold as usize][italic as usize];
        match slot {
            Some(face) => *face,
            None => *slot.insert(resolver.resolve(settings, bold, italic)),
        }
    }

    /// Drops all cached faces if `font_generation` moved past the one
    /// the cache was filled under.
    pub fn revalidate(&mut self, font_generation: Generation) {
        if self.generation != font_generation {
            self.faces = Default::default();
            self.generation = font_generation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Generational, Settings};

    struct CountingResolver {
        calls: u32,
    }

    impl FontResolver for CountingResolver {
        fn resolve(&mut self, _: &FontSettings, bold: bool, italic: bool) -> FontFace {
            self.calls += 1;
            FontFace {
                id: FontFaceId(1 + bold as u64 + 2 * italic as u64),
                em_size: 16.0,
            }
        }
    }

    #[test]
    fn faces_resolve_once_per_attribute_pair() {
        let mut resolver = CountingResolver { calls: 0 };
        let settings = FontSettings::default();
        let mut cache = FaceCache::default();

        let regular = cache.get(&mut resolver, &settings, false, false);
        let bold = cache.get(&mut resolver, &settings, true, false);
        assert_ne!(regular.id, bold.id);

        cache.get(&mut resolver, &settings, false, false);
        cache.get(&mut resolver, &settings, true, false);
        assert_eq!(resolver.calls, 2);
    }

    #[test]
    fn revalidate_drops_faces_on_generation_change() {
        let mut resolver = CountingResolver { calls: 0 };
        let mut s: Generational<Settings> = Settings::invalidated();
        let mut cache = FaceCache::default();

        cache.revalidate(s.font.generation());
        cache.get(&mut resolver, &s.font, false, false);
        cache.revalidate(s.font.generation());
        cache.get(&mut resolver, &s.font, false, false);
        assert_eq!(resolver.calls, 1);

        s.font_mut().cell_size = [9, 18];
        cache.revalidate(s.font.generation());
        cache.get(&mut resolver, &s.font, false, false);
        assert_eq!(resolver.calls, 2);
    }
}
