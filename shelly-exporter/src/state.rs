/**
 * ÉTAT D'AGRÉGATION - Unités retenues entre deux scrapes
 *
 * RÔLE :
 * Deux formes d'état coexistent selon la classe d'appareil :
 * - LatestSlot : cache du dernier message complet (last-write-wins)
 * - DrainMap : map topic -> dernière valeur scalaire, vidée à chaque scrape
 *
 * CONCURRENCE :
 * - LatestSlot remplace un pointeur (arc-swap), aucun verrou : un scrape voit
 *   l'objet précédent ou le suivant, jamais un objet partiel.
 * - DrainMap prend un Mutex uniquement pour un insert ou pour l'échange
 *   de la map vivante contre une map vide.
 */

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Dernier objet complet reçu ; `None` tant que rien n'est arrivé.
pub struct LatestSlot<T> {
    slot: ArcSwapOption<T>,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self { slot: ArcSwapOption::empty() }
    }

    /// Remplace l'objet retenu, l'ancien est simplement abandonné.
    pub fn store(&self, value: T) {
        self.slot.store(Some(Arc::new(value)));
    }

    /// Lecture sans reset : le slot reste en place jusqu'au prochain message.
    pub fn load(&self) -> Option<Arc<T>> {
        self.slot.load_full()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Map clé -> dernière valeur, drainée à chaque snapshot.
///
/// Un `insert` concurrent à `drain` atterrit soit dans la map drainée, soit
/// dans la nouvelle : la valeur n'est jamais perdue, au pire décalée d'un
/// intervalle de scrape. Aucun ordre plus strict n'est garanti.
pub struct DrainMap<V> {
    live: Shared<BTreeMap<String, V>>,
}

impl<V> DrainMap<V> {
    pub fn new() -> Self {
        Self { live: new_state(BTreeMap::new()) }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.live.lock().insert(key.into(), value);
    }

    /// Échange la map vivante contre une vide et rend l'ancienne, triée par clé.
    pub fn drain(&self) -> Vec<(String, V)> {
        let taken = std::mem::take(&mut *self.live.lock());
        taken.into_iter().collect()
    }

    /// Réinjecte des entrées drainées sans écraser une valeur arrivée depuis.
    pub fn restore(&self, entries: Vec<(String, V)>) {
        let mut live = self.live.lock();
        for (key, value) in entries {
            live.entry(key).or_insert(value);
        }
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Default for DrainMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_slot_starts_empty_and_keeps_last() {
        let slot = LatestSlot::new();
        assert!(slot.load().is_none());

        slot.store("first".to_string());
        slot.store("second".to_string());
        assert_eq!(slot.load().as_deref().map(String::as_str), Some("second"));
        // pas de reset à la lecture
        assert!(slot.load().is_some());
    }

    #[test]
    fn test_drain_map_drains_once() {
        let map = DrainMap::new();
        map.insert("b", 2.0);
        map.insert("a", 1.0);
        map.insert("a", 1.5);

        let drained = map.drain();
        assert_eq!(drained, vec![("a".to_string(), 1.5), ("b".to_string(), 2.0)]);
        assert!(map.is_empty());
        assert!(map.drain().is_empty());
    }

    #[test]
    fn test_drain_map_restore_keeps_newer_values() {
        let map = DrainMap::new();
        map.insert("a", 1.0);
        map.insert("b", 2.0);
        let drained = map.drain();

        map.insert("b", 3.0);
        map.restore(drained);
        assert_eq!(map.drain(), vec![("a".to_string(), 1.0), ("b".to_string(), 3.0)]);
    }

    #[test]
    fn test_drain_map_concurrent_inserts_are_never_lost() {
        let map = Arc::new(DrainMap::new());
        let writer = {
            let map = map.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    map.insert(format!("k{i:04}"), i as f64);
                }
            })
        };

        let mut seen = Vec::new();
        while !writer.is_finished() {
            seen.extend(map.drain());
        }
        writer.join().unwrap();
        seen.extend(map.drain());

        seen.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(seen.len(), 1000);
        assert_eq!(seen[0].0, "k0000");
        assert_eq!(seen[999].0, "k0999");
    }
}
