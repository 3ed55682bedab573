use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use flowview::DataAggregator;

use crate::{StoreOptions, VirtualDataStore};

/// The per-dataset state: a chunk store and the aggregator fed from it.
pub struct Dataset<T, S> {
    pub store: VirtualDataStore<T, S>,
    pub aggregator: Rc<RefCell<DataAggregator<T>>>,
}

impl<T, S> Clone for Dataset<T, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            aggregator: Rc::clone(&self.aggregator),
        }
    }
}

/// Owns one [`Dataset`] per query key.
///
/// Datasets live from `create` until `dispose`. `invalidate` empties a dataset in place so
/// existing handles see fresh data on their next load. Fetches still in flight when their
/// dataset is disposed or invalidated complete without touching it.
pub struct DatasetRegistry<Q, T, S> {
    options: StoreOptions,
    make_source: Box<dyn Fn(&Q) -> S>,
    datasets: HashMap<Q, Dataset<T, S>>,
}

impl<Q, T, S> DatasetRegistry<Q, T, S>
where
    Q: Eq + Hash + Clone,
{
    pub fn new(options: StoreOptions, make_source: impl Fn(&Q) -> S + 'static) -> Self {
        Self {
            options,
            make_source: Box::new(make_source),
            datasets: HashMap::new(),
        }
    }

    /// Returns the dataset for `key`, creating it on first use.
    pub fn create(&mut self, key: Q) -> Dataset<T, S> {
        if let Some(existing) = self.datasets.get(&key) {
            return existing.clone();
        }
        vdebug!(datasets = self.datasets.len() + 1, "creating dataset");
        let source = (self.make_source)(&key);
        let dataset = Dataset {
            store: VirtualDataStore::new(source, self.options),
            aggregator: Rc::new(RefCell::new(DataAggregator::default())),
        };
        self.datasets.insert(key, dataset.clone());
        dataset
    }

    pub fn get(&self, key: &Q) -> Option<Dataset<T, S>> {
        self.datasets.get(key).cloned()
    }

    pub fn contains(&self, key: &Q) -> bool {
        self.datasets.contains_key(key)
    }

    /// Clears the dataset's cache and aggregates. Returns `false` for unknown keys.
    pub fn invalidate(&self, key: &Q) -> bool {
        let Some(dataset) = self.datasets.get(key) else {
            return false;
        };
        dataset.store.reset();
        dataset.aggregator.borrow_mut().reset(Vec::new());
        vdebug!("dataset invalidated");
        true
    }

    /// Drops the dataset. Returns `false` for unknown keys.
    pub fn dispose(&mut self, key: &Q) -> bool {
        let Some(dataset) = self.datasets.remove(key) else {
            return false;
        };
        // Handles still held elsewhere see an empty store and aggregator from now on.
        dataset.store.reset();
        dataset.aggregator.borrow_mut().reset(Vec::new());
        vdebug!(datasets = self.datasets.len(), "dataset disposed");
        true
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
