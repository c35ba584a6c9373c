//! Recipe persistence.
//!
//! `RecipeStore` is the boundary the rest of the crate talks to. `LocalRecipeStore`
//! keeps every user's recipes in one JSON file and pushes a fresh per-owner
//! snapshot to subscribers after each change. Writes are applied one at a time, so
//! the last write to a document wins.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::error::PersistenceError;
use crate::recipe::{OwnerId, Recipe, RecipeDraft, RecipeId, RecipePatch};

type Documents = Arc<BTreeMap<RecipeId, Recipe>>;

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Open-ended feed of `owner`'s full collection.
    fn subscribe(&self, owner: &OwnerId) -> RecipeSubscription;

    async fn create(&self, owner: &OwnerId, draft: RecipeDraft) -> Result<RecipeId, PersistenceError>;

    /// Replace the fields set in `patch`. The document's timestamp moves to now.
    /// Documents belonging to another owner are reported as `NotFound`.
    async fn update(&self, owner: &OwnerId, id: RecipeId, patch: RecipePatch) -> Result<(), PersistenceError>;

    async fn delete(&self, owner: &OwnerId, id: RecipeId) -> Result<(), PersistenceError>;

    /// Add or remove `a` and `b` as accompaniments of each other. Both documents
    /// change together or neither does.
    async fn set_pairing(&self, owner: &OwnerId, a: RecipeId, b: RecipeId, paired: bool) -> Result<(), PersistenceError>;
}

/// Snapshots of one owner's recipes, newest first.
///
/// Nothing happens until `next` is awaited. The first call yields the current
/// collection; later calls wait for a change that alters this owner's view. `None`
/// means the store has gone away.
pub struct RecipeSubscription {
    owner: OwnerId,
    receiver: watch::Receiver<Documents>,
    last: Option<Vec<Recipe>>,
}

impl RecipeSubscription {
    pub async fn next(&mut self) -> Option<Vec<Recipe>> {
        loop {
            if self.last.is_some() {
                self.receiver.changed().await.ok()?;
            }
            let documents = Arc::clone(&self.receiver.borrow_and_update());
            let snapshot = owner_snapshot(&documents, &self.owner);
            if self.last.as_ref() != Some(&snapshot) {
                self.last = Some(snapshot.clone());
                return Some(snapshot);
            }
        }
    }

    /// A fresh subscription for the same owner, starting again from the current state.
    pub fn restart(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            receiver: self.receiver.clone(),
            last: None,
        }
    }
}

fn owned_mut<'a>(
    docs: &'a mut BTreeMap<RecipeId, Recipe>,
    owner: &OwnerId,
    id: RecipeId,
) -> Result<&'a mut Recipe, PersistenceError> {
    docs.get_mut(&id)
        .filter(|r| &r.owner_id == owner)
        .ok_or(PersistenceError::NotFound(id))
}

fn owner_snapshot(documents: &BTreeMap<RecipeId, Recipe>, owner: &OwnerId) -> Vec<Recipe> {
    let mut recipes: Vec<Recipe> = documents
        .values()
        .filter(|r| &r.owner_id == owner)
        .cloned()
        .collect();
    recipes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    recipes
}

pub struct LocalRecipeStore {
    path: Option<PathBuf>,
    documents: watch::Sender<Documents>,
    write_lock: Mutex<()>,
}

impl LocalRecipeStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_documents(None, BTreeMap::new())
    }

    /// Load `path` if it exists; changes are written back to it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let documents = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => {
                let recipes: Vec<Recipe> = serde_json::from_slice(&bytes)?;
                recipes.into_iter().map(|r| (r.id, r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(PersistenceError::Read { path, source }),
        };
        tracing::info!(path = %path.display(), recipes = documents.len(), "Opened recipe store");
        Ok(Self::with_documents(Some(path), documents))
    }

    fn with_documents(path: Option<PathBuf>, documents: BTreeMap<RecipeId, Recipe>) -> Self {
        let (sender, _) = watch::channel(Arc::new(documents));
        Self {
            path,
            documents: sender,
            write_lock: Mutex::new(()),
        }
    }

    /// Current snapshot for `owner` without subscribing.
    pub fn snapshot(&self, owner: &OwnerId) -> Vec<Recipe> {
        owner_snapshot(&self.documents.borrow(), owner)
    }

    /// Apply `change` to a copy of the collection, persist it, then publish it.
    /// Callers hold `write_lock`.
    async fn commit(
        &self,
        change: impl FnOnce(&mut BTreeMap<RecipeId, Recipe>) -> Result<(), PersistenceError>,
    ) -> Result<(), PersistenceError> {
        let mut next = (**self.documents.borrow()).clone();
        change(&mut next)?;
        if let Some(path) = &self.path {
            persist(path, &next).await?;
        }
        self.documents.send_replace(Arc::new(next));
        Ok(())
    }
}

async fn persist(path: &Path, documents: &BTreeMap<RecipeId, Recipe>) -> Result<(), PersistenceError> {
    let recipes: Vec<&Recipe> = documents.values().collect();
    let bytes = serde_json::to_vec_pretty(&recipes)?;
    let tmp = path.with_extension("json.tmp");
    let write_err = |source: std::io::Error| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, &bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    tracing::debug!(path = %path.display(), recipes = recipes.len(), "Saved recipe store");
    Ok(())
}

#[async_trait]
impl RecipeStore for LocalRecipeStore {
    fn subscribe(&self, owner: &OwnerId) -> RecipeSubscription {
        RecipeSubscription {
            owner: owner.clone(),
            receiver: self.documents.subscribe(),
            last: None,
        }
    }

    async fn create(&self, owner: &OwnerId, draft: RecipeDraft) -> Result<RecipeId, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let id = RecipeId::new();
        let recipe = Recipe::from_draft(id, owner.clone(), draft, Utc::now());
        tracing::info!(%id, dish = %recipe.dish_name, "Creating recipe");
        self.commit(|docs| {
            docs.insert(id, recipe);
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn update(&self, owner: &OwnerId, id: RecipeId, patch: RecipePatch) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        self.commit(|docs| {
            let recipe = owned_mut(docs, owner, id)?;
            patch.apply(recipe);
            recipe.timestamp = Utc::now();
            Ok(())
        })
        .await?;
        tracing::info!(%id, "Updated recipe");
        Ok(())
    }

    async fn delete(&self, owner: &OwnerId, id: RecipeId) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        self.commit(|docs| {
            owned_mut(docs, owner, id)?;
            docs.remove(&id);
            // Nothing may keep pointing at a deleted recipe.
            for other in docs.values_mut() {
                other.paired_with.remove(&id);
            }
            Ok(())
        })
        .await?;
        tracing::info!(%id, "Deleted recipe");
        Ok(())
    }

    async fn set_pairing(&self, owner: &OwnerId, a: RecipeId, b: RecipeId, paired: bool) -> Result<(), PersistenceError> {
        if a == b {
            return Err(PersistenceError::SelfPairing(a));
        }
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        self.commit(|docs| {
            owned_mut(docs, owner, a)?;
            owned_mut(docs, owner, b)?;
            for (id, partner) in [(a, b), (b, a)] {
                let recipe = owned_mut(docs, owner, id)?;
                let changed = if paired {
                    recipe.paired_with.insert(partner)
                } else {
                    recipe.paired_with.remove(&partner)
                };
                if changed {
                    recipe.timestamp = now;
                }
            }
            Ok(())
        })
        .await?;
        tracing::info!(first = %a, second = %b, paired, "Updated pairing");
        Ok(())
    }
}

/// Record `a` and `b` as accompaniments of each other.
pub async fn pair_recipes(
    store: &dyn RecipeStore,
    owner: &OwnerId,
    a: RecipeId,
    b: RecipeId,
) -> Result<(), PersistenceError> {
    store.set_pairing(owner, a, b, true).await
}

/// Undo `pair_recipes`.
pub async fn unpair_recipes(
    store: &dyn RecipeStore,
    owner: &OwnerId,
    a: RecipeId,
    b: RecipeId,
) -> Result<(), PersistenceError> {
    store.set_pairing(owner, a, b, false).await
}
