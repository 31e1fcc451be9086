//! Content generation flow
//!
//! auth → prompt validation → generate → canonicalize → insert `pending`.
//! A malformed hash from the backend aborts before anything is stored.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::crypto::to_storage_form;
use crate::domain::{NewProof, Prompt, ProofRecord};
use crate::infra::{Authenticator, ContentGenerator, ProofError, ProofStore, Result};

/// Map a generation backend HTTP failure onto the error taxonomy
pub fn generation_failure(status: u16, message: impl Into<String>) -> ProofError {
    match status {
        429 => ProofError::RateLimited,
        402 => ProofError::CreditsExhausted,
        _ => ProofError::Generation(format!("backend returned {status}: {}", message.into())),
    }
}

/// A freshly generated proof: the stored record plus the full content,
/// which is never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProof {
    pub record: ProofRecord,
    pub content: String,
}

pub struct ProofGenerator<A, G, S> {
    auth: Arc<A>,
    generator: Arc<G>,
    store: Arc<S>,
}

impl<A, G, S> ProofGenerator<A, G, S>
where
    A: Authenticator,
    G: ContentGenerator,
    S: ProofStore,
{
    pub fn new(auth: Arc<A>, generator: Arc<G>, store: Arc<S>) -> Self {
        Self {
            auth,
            generator,
            store,
        }
    }

    /// Generate content for `prompt` and record a pending proof for it
    #[instrument(skip_all, fields(prompt_chars = prompt.chars().count()))]
    pub async fn create_proof(&self, prompt: &str) -> Result<GeneratedProof> {
        let owner_id = self
            .auth
            .current_user()
            .await
            .ok_or(ProofError::Unauthenticated)?;
        let prompt = Prompt::new(prompt)?;

        let generated = self.generator.generate(&prompt).await?;
        let hash = to_storage_form(&generated.hash).map_err(|e| {
            warn!(owner = %owner_id, error = %e, "generator returned a malformed hash");
            e
        })?;

        let proof = NewProof::new(owner_id, prompt, &generated.content, hash)
            .with_created_at(generated.generated_at);
        let record = self.store.insert(proof).await?;

        info!(id = %record.id, owner = %record.owner_id, hash = %record.hash, "proof created");
        Ok(GeneratedProof {
            record,
            content: generated.content,
        })
    }
}
